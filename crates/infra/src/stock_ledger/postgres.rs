//! Postgres-backed stock ledger.
//!
//! ## Transaction
//!
//! `adjust()` runs in one transaction:
//! 1. For a decrease, lock the product row (`SELECT ... FOR UPDATE`) and check
//!    the balance. A missing row or an overdraw aborts before any write.
//! 2. Insert the movement row.
//! 3. `UPDATE products SET stock = stock + change ... WHERE stock + change >= 0`.
//!    The guard in the same statement re-checks the balance under the row
//!    lock, and `CHECK (stock >= 0)` backs it at the schema level.
//! 4. Commit.
//!
//! Dropping the transaction without committing rolls it back, so any early
//! return (including a client disconnect cancelling the request future)
//! leaves no trace.
//!
//! ## Error Mapping
//!
//! | Failure | StoreError |
//! |---------|------------|
//! | product row missing | `Domain(NotFound("product"))` |
//! | acting user missing (`stock_movements_user_id_fkey`) | `Domain(NotFound("user"))` |
//! | guard or check fails | `Domain(InsufficientStock)` |
//! | serialization failure, deadlock, IO, pool | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, field::Empty, instrument};

use sabueso_core::{DomainError, MovementId, ProductId, UserId};
use sabueso_inventory::{AdjustStock, MovementQuery, MovementType, MovementView, StockMovement};
use sabueso_products::Product;

use super::StockLedger;
use crate::catalog::postgres::{PRODUCT_COLUMNS, ProductRow};
use crate::error::{StoreError, foreign_key_violation, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PostgresStockLedger {
    pool: Arc<PgPool>,
}

impl PostgresStockLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id(),
            user_id = %request.user_id(),
            movement_type = %request.movement_type(),
            change = request.change(),
            operation = Empty,
            stock = Empty
        ),
        err
    )]
    async fn adjust(&self, request: AdjustStock) -> Result<Product, StoreError> {
        let span = Span::current();
        span.record("operation", "adjust");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let product = apply_adjustment(&mut tx, &request).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("stock", product.stock);
        Ok(product)
    }

    #[instrument(skip(self), fields(operation = Empty), err)]
    async fn movements(&self, query: MovementQuery) -> Result<Vec<MovementView>, StoreError> {
        Span::current().record("operation", "movements");

        let rows = sqlx::query(
            r#"
            SELECT
                m.id,
                m.product_id,
                m.user_id,
                m.movement_type_id,
                m.change,
                m.reference_id,
                m.created_at,
                u.username
            FROM stock_movements m
            JOIN users u ON u.id = m.user_id
            WHERE ($1::bigint IS NULL OR m.product_id = $1)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2
            "#,
        )
        .bind(query.product_id.map(ProductId::get))
        .bind(i64::from(query.limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter()
            .map(|row| -> Result<MovementView, StoreError> {
                let movement = MovementRow::from_row(row)
                    .map_err(|e| map_sqlx_error("decode_movement", e))?
                    .into_movement()?;
                let username: String = row
                    .try_get("username")
                    .map_err(|e| map_sqlx_error("decode_movement", e))?;
                Ok(MovementView { movement, username })
            })
            .collect()
    }
}

/// Steps 1-3 of the adjustment inside a caller-owned transaction.
///
/// Shared with the catalog, which records a new product's initial stock in
/// the same transaction as the product insert.
pub(crate) async fn apply_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    request: &AdjustStock,
) -> Result<Product, StoreError> {
    let product_id = request.product_id().get();

    if request.is_decrease() {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(current) = current else {
            return Err(DomainError::not_found("product").into());
        };
        sabueso_inventory::apply_change(current, request.change())?;
    }

    insert_movement(tx, request).await?;

    let updated = sqlx::query(&format!(
        r#"
        UPDATE products
        SET stock = stock + $1, updated_at = now()
        WHERE id = $2 AND stock + $1 >= 0
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(request.change())
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_stock", e))?;

    match updated {
        Some(row) => Ok(ProductRow::from_row(&row)
            .map_err(|e| map_sqlx_error("decode_product", e))?
            .into()),
        None => {
            // Either the row vanished or the guard failed; report which.
            let current: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("recheck_stock", e))?;
            Err(match current {
                Some(available) => DomainError::insufficient_stock(available, request.change()),
                None => DomainError::not_found("product"),
            }
            .into())
        }
    }
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    request: &AdjustStock,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (product_id, user_id, movement_type_id, change, reference_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(request.product_id().get())
    .bind(request.user_id().get())
    .bind(request.movement_type().id())
    .bind(request.change())
    .bind(request.reference_id())
    .execute(&mut **tx)
    .await
    .map_err(|e| match foreign_key_violation(&e).as_deref() {
        Some("stock_movements_user_id_fkey") => DomainError::not_found("user").into(),
        Some(_) => DomainError::not_found("product").into(),
        None => map_sqlx_error("insert_movement", e),
    })?;
    Ok(())
}

// SQLx row types

#[derive(Debug)]
struct MovementRow {
    id: i64,
    product_id: i64,
    user_id: i64,
    movement_type_id: i32,
    change: i64,
    reference_id: i64,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            user_id: row.try_get("user_id")?,
            movement_type_id: row.try_get("movement_type_id")?,
            change: row.try_get("change")?,
            reference_id: row.try_get("reference_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl MovementRow {
    fn into_movement(self) -> Result<StockMovement, StoreError> {
        let movement_type = MovementType::from_id(i64::from(self.movement_type_id))
            .map_err(|e| StoreError::storage(format!("corrupt movement row {}: {e}", self.id)))?;
        Ok(StockMovement {
            id: MovementId::from_raw(self.id),
            product_id: ProductId::from_raw(self.product_id),
            user_id: UserId::from_raw(self.user_id),
            movement_type,
            change: self.change,
            reference_id: self.reference_id,
            created_at: self.created_at,
        })
    }
}
