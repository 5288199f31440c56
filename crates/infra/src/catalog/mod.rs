//! Product catalog boundary.
//!
//! The catalog never writes `stock` directly. A new product's initial
//! quantity goes through the ledger as a `purchase_in` movement inside the
//! same transaction as the product insert.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use sabueso_core::{ProductId, UserId};
use sabueso_products::{CatalogAttributes, NewProduct, Product, ProductUpdate};

use crate::error::StoreError;

pub use in_memory::InMemoryProductCatalog;
pub use postgres::PostgresProductCatalog;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Non-deleted products ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError>;

    /// Insert a product; `actor` is recorded on the initial stock movement.
    async fn create_product(&self, product: NewProduct, actor: UserId) -> Result<Product, StoreError>;

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, StoreError>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError>;

    async fn attributes(&self) -> Result<CatalogAttributes, StoreError>;
}
