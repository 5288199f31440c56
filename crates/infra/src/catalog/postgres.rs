//! Postgres-backed product catalog.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, field::Empty, instrument};

use sabueso_core::{DomainError, ProductId, UserId};
use sabueso_inventory::{AdjustStock, MovementType};
use sabueso_products::{
    CatalogAttributes, NamedRef, NewProduct, Product, ProductLine, ProductUpdate, SubProductLine,
    validate_barcode,
};

use super::ProductCatalog;
use crate::error::{StoreError, map_sqlx_error};
use crate::stock_ledger::postgres::apply_adjustment;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, sku, barcode, stock, \
    retail_price, wholesale_price, weight, extra_weight, brand_id, animal_id, product_line_id, \
    sub_product_line_id, animal_age_id, animal_size_id, created_at, updated_at, is_deleted";

#[derive(Debug, Clone)]
pub struct PostgresProductCatalog {
    pool: Arc<PgPool>,
}

impl PostgresProductCatalog {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_deleted = false ORDER BY id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(decode_product).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .ok_or(DomainError::not_found("product"))?;
        decode_product(&row)
    }

    #[instrument(
        skip(self, product),
        fields(actor = %actor, product_id = Empty),
        err
    )]
    async fn create_product(&self, product: NewProduct, actor: UserId) -> Result<Product, StoreError> {
        let product = product.normalized()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                name, description, sku, barcode, retail_price, wholesale_price, weight,
                extra_weight, brand_id, animal_id, product_line_id, sub_product_line_id,
                animal_age_id, animal_size_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(product.retail_price)
        .bind(product.wholesale_price)
        .bind(product.weight)
        .bind(product.extra_weight)
        .bind(product.brand_id)
        .bind(product.animal_id)
        .bind(product.product_line_id)
        .bind(product.sub_product_line_id)
        .bind(product.animal_age_id)
        .bind(product.animal_size_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Span::current().record("product_id", id);

        let created = if product.initial_stock > 0 {
            let initial = AdjustStock::new(
                id,
                actor,
                MovementType::PurchaseIn,
                product.initial_stock,
                None,
            )?;
            apply_adjustment(&mut tx, &initial).await?
        } else {
            fetch_product(&mut tx, id).await?
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(created)
    }

    #[instrument(skip(self, update), fields(product_id = %id), err)]
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, StoreError> {
        let update = update.normalized()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .ok_or(DomainError::not_found("product"))?;

        let mut product = decode_product(&row)?;
        update.apply_to(&mut product, Utc::now());

        // `stock` is intentionally absent from the SET list.
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, sku = $4, barcode = $5, retail_price = $6,
                wholesale_price = $7, weight = $8, extra_weight = $9, brand_id = $10,
                animal_id = $11, product_line_id = $12, sub_product_line_id = $13,
                animal_age_id = $14, animal_size_id = $15, is_deleted = $16, updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(product.retail_price)
        .bind(product.wholesale_price)
        .bind(product.weight)
        .bind(product.extra_weight)
        .bind(product.brand_id)
        .bind(product.animal_id)
        .bind(product.product_line_id)
        .bind(product.sub_product_line_id)
        .bind(product.animal_age_id)
        .bind(product.animal_size_id)
        .bind(product.is_deleted)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        let updated = decode_product(&row)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), err)]
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let barcode = validate_barcode(barcode)?;
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1"))
            .bind(&barcode)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_barcode", e))?;
        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), err)]
    async fn attributes(&self) -> Result<CatalogAttributes, StoreError> {
        let pool = &*self.pool;
        let brands = named_refs(pool, "SELECT id, name FROM brands").await?;
        let animals = named_refs(pool, "SELECT id, name FROM animals").await?;
        let animal_ages = named_refs(pool, "SELECT id, name FROM animal_ages").await?;
        let animal_sizes = named_refs(pool, "SELECT id, name FROM animal_sizes").await?;

        let lines = sqlx::query("SELECT id, name, brand_id FROM product_lines")
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx_error("product_lines", e))?
            .iter()
            .map(|row| -> Result<ProductLine, sqlx::Error> {
                Ok(ProductLine {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    brand_id: row.try_get("brand_id")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_product_line", e))?;

        let sub_product_lines = sqlx::query(
            r#"
            SELECT s.id, s.name, l.id AS line_id, l.name AS line_name, l.brand_id
            FROM sub_product_lines s
            JOIN product_lines l ON l.id = s.product_line_id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("sub_product_lines", e))?
        .iter()
        .map(|row| -> Result<SubProductLine, sqlx::Error> {
            Ok(SubProductLine {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                product_line: ProductLine {
                    id: row.try_get("line_id")?,
                    name: row.try_get("line_name")?,
                    brand_id: row.try_get("brand_id")?,
                },
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| map_sqlx_error("decode_sub_product_line", e))?;

        Ok(CatalogAttributes {
            brands,
            animals,
            lines,
            sub_product_lines,
            animal_ages,
            animal_sizes,
        }
        .sorted())
    }
}

async fn fetch_product(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Product, StoreError> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", e))?
        .ok_or(DomainError::not_found("product"))?;
    decode_product(&row)
}

async fn named_refs(pool: &PgPool, sql: &'static str) -> Result<Vec<NamedRef>, StoreError> {
    sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("named_refs", e))?
        .iter()
        .map(|row| -> Result<NamedRef, sqlx::Error> {
            Ok(NamedRef {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| map_sqlx_error("decode_named_ref", e))
}

fn decode_product(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    ProductRow::from_row(row)
        .map(Product::from)
        .map_err(|e| map_sqlx_error("decode_product", e))
}

// SQLx row types

#[derive(Debug)]
pub(crate) struct ProductRow {
    id: i64,
    name: String,
    description: String,
    sku: String,
    barcode: Option<String>,
    stock: i64,
    retail_price: i64,
    wholesale_price: i64,
    weight: i32,
    extra_weight: i32,
    brand_id: i64,
    animal_id: i64,
    product_line_id: Option<i64>,
    sub_product_line_id: Option<i64>,
    animal_age_id: Option<i64>,
    animal_size_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            sku: row.try_get("sku")?,
            barcode: row.try_get("barcode")?,
            stock: row.try_get("stock")?,
            retail_price: row.try_get("retail_price")?,
            wholesale_price: row.try_get("wholesale_price")?,
            weight: row.try_get("weight")?,
            extra_weight: row.try_get("extra_weight")?,
            brand_id: row.try_get("brand_id")?,
            animal_id: row.try_get("animal_id")?,
            product_line_id: row.try_get("product_line_id")?,
            sub_product_line_id: row.try_get("sub_product_line_id")?,
            animal_age_id: row.try_get("animal_age_id")?,
            animal_size_id: row.try_get("animal_size_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_raw(row.id),
            name: row.name,
            description: row.description,
            sku: row.sku,
            barcode: row.barcode,
            stock: row.stock,
            retail_price: row.retail_price,
            wholesale_price: row.wholesale_price,
            weight: row.weight,
            extra_weight: row.extra_weight,
            brand_id: row.brand_id,
            animal_id: row.animal_id,
            product_line_id: row.product_line_id,
            sub_product_line_id: row.sub_product_line_id,
            animal_age_id: row.animal_age_id,
            animal_size_id: row.animal_size_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_deleted: row.is_deleted,
        }
    }
}
