//! Stock movement ledger boundary.
//!
//! `adjust` is the only way a product's stock changes. Each call appends one
//! movement and moves the cached balance by the same amount, atomically:
//! either both happen or neither does. A change that would leave the balance
//! negative is rejected with `InsufficientStock` and writes nothing.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use sabueso_inventory::{AdjustStock, MovementQuery, MovementView};
use sabueso_products::Product;

use crate::error::StoreError;

pub use in_memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;

#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Record a movement and apply it to the product's balance.
    ///
    /// Returns the product with its updated stock.
    async fn adjust(&self, request: AdjustStock) -> Result<Product, StoreError>;

    /// Ledger rows, newest first, with the acting user's username.
    async fn movements(&self, query: MovementQuery) -> Result<Vec<MovementView>, StoreError>;
}
