//! `sabueso-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod serde_ext;

pub use error::{DomainError, DomainResult};
pub use id::{MovementId, ProductId, UserId};
