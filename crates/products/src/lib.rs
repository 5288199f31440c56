//! Product catalog domain module.
//!
//! Catalog records, create/edit requests and their validation (no IO).

pub mod attributes;
pub mod product;

pub use attributes::{CatalogAttributes, NamedRef, ProductLine, SubProductLine};
pub use product::{NewProduct, Product, ProductUpdate, validate_barcode};
