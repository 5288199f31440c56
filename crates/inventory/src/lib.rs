//! Inventory domain module: the stock movement ledger.
//!
//! This crate contains the ledger's business rules as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod movement;

pub use movement::{
    AdjustStock, MovementQuery, MovementType, MovementView, StockMovement, apply_change,
    ledger_balance,
};
