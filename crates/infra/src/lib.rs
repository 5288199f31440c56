//! Infrastructure layer: configuration, database pool, stores and the mail
//! seam.
//!
//! Each store is a trait with a Postgres implementation (sqlx) and an
//! in-memory implementation for tests/dev. In-memory stores built over the
//! same [`InMemoryDatabase`] share their tables, like Postgres stores sharing
//! a pool.

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod memory;
pub mod stock_ledger;

pub use accounts::{AccountService, InMemoryUserDirectory, PostgresUserDirectory, UserDirectory};
pub use catalog::{InMemoryProductCatalog, PostgresProductCatalog, ProductCatalog};
pub use crate::config::{AppConfig, ConfigError, LogFormat};
pub use error::{StoreError, StoreResult};
pub use mail::{LogMailer, MailError, Mailer, OutgoingMail};
pub use memory::InMemoryDatabase;
pub use stock_ledger::{InMemoryStockLedger, PostgresStockLedger, StockLedger};
