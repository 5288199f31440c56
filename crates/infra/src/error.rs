//! Store error model and SQLx error mapping.
//!
//! | SQLx error | SQLSTATE | StoreError |
//! |------------|----------|------------|
//! | unique violation | `23505` | `Domain(Conflict)` |
//! | foreign key violation | `23503` | `Domain(Validation)` |
//! | check violation | `23514` | `Domain(Validation)` |
//! | numeric value out of range | `22003` | `Domain(Validation)` |
//! | serialization failure / deadlock | `40001` / `40P01` | `Storage` |
//! | pool closed, IO, timeouts, anything else | n/a | `Storage` |

use thiserror::Error;

use sabueso_core::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Transient storage failure. Surfaced to the caller, never retried here.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub(crate) fn poisoned() -> Self {
        Self::Storage("lock poisoned".to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => {
                    let what = db_err.constraint().unwrap_or("unique constraint");
                    StoreError::Domain(DomainError::conflict(format!("duplicate value ({what})")))
                }
                Some("23503") => StoreError::Domain(DomainError::validation(format!(
                    "referenced record does not exist ({})",
                    db_err.constraint().unwrap_or("foreign key")
                ))),
                Some("23514") => StoreError::Domain(DomainError::validation(format!(
                    "constraint violated ({})",
                    db_err.constraint().unwrap_or("check")
                ))),
                // Stock or id arithmetic beyond BIGINT: a bad request, not an outage.
                Some("22003") => StoreError::Domain(DomainError::validation(format!(
                    "value out of range in {operation}"
                ))),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Storage(format!("timed out acquiring a connection in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Storage(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Constraint name of a foreign key violation, if `err` is one.
pub(crate) fn foreign_key_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23503") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct PgError {
        code: &'static str,
        constraint: Option<&'static str>,
        message: &'static str,
    }

    impl sqlx::error::DatabaseError for PgError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn db_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgError {
            code,
            constraint,
            message: "from postgres",
        }))
    }

    #[test]
    fn numeric_overflow_is_a_validation_error() {
        let err = map_sqlx_error("update_stock", db_error("22003", None));
        assert_eq!(
            err,
            StoreError::Domain(DomainError::validation("value out of range in update_stock"))
        );
    }

    #[test]
    fn constraint_violations_map_to_domain_errors() {
        let err = map_sqlx_error("create_product", db_error("23505", Some("products_barcode_key")));
        assert_eq!(
            err,
            StoreError::Domain(DomainError::conflict("duplicate value (products_barcode_key)"))
        );

        let err = map_sqlx_error(
            "insert_movement",
            db_error("23503", Some("stock_movements_user_id_fkey")),
        );
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert_eq!(
            foreign_key_violation(&db_error("23503", Some("stock_movements_user_id_fkey"))),
            Some("stock_movements_user_id_fkey".to_string())
        );
    }

    #[test]
    fn serialization_failures_and_pool_errors_are_storage() {
        assert!(matches!(
            map_sqlx_error("commit_transaction", db_error("40001", None)),
            StoreError::Storage(_)
        ));
        assert!(matches!(
            map_sqlx_error("lock_product", sqlx::Error::PoolTimedOut),
            StoreError::Storage(_)
        ));
    }
}
