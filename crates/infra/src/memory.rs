//! Shared in-memory tables backing the in-memory stores.
//!
//! Intended for tests/dev. Every store operation runs under one mutex, so
//! each call is serialized and sees a consistent snapshot. Multi-step writes
//! go through [`Tables::transaction`], which undoes them if any step fails.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use sabueso_auth::User;
use sabueso_core::{DomainError, MovementId, ProductId, UserId};
use sabueso_inventory::{AdjustStock, StockMovement, apply_change};
use sabueso_products::{CatalogAttributes, NamedRef, Product, ProductLine, SubProductLine};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub user: User,
    pub password_hash: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub products: BTreeMap<i64, Product>,
    pub movements: Vec<StockMovement>,
    pub users: BTreeMap<i64, UserRecord>,
    pub tokens: Vec<sabueso_auth::VerificationToken>,
    pub attributes: CatalogAttributes,
    next_product_id: i64,
    next_movement_id: i64,
    next_user_id: i64,
    next_address_id: i64,
}

impl Tables {
    pub fn next_product_id(&mut self) -> ProductId {
        self.next_product_id += 1;
        ProductId::from_raw(self.next_product_id)
    }

    pub fn next_user_id(&mut self) -> UserId {
        self.next_user_id += 1;
        UserId::from_raw(self.next_user_id)
    }

    pub fn next_address_id(&mut self) -> i64 {
        self.next_address_id += 1;
        self.next_address_id
    }

    fn next_movement_id(&mut self) -> MovementId {
        self.next_movement_id += 1;
        MovementId::from_raw(self.next_movement_id)
    }

    /// Validate an adjustment against current state and return the staged
    /// movement and the new balance. Touches nothing.
    pub fn stage_adjust(
        &self,
        request: &AdjustStock,
        now: DateTime<Utc>,
    ) -> StoreResult<(StockMovement, i64)> {
        let product = self
            .products
            .get(&request.product_id().get())
            .ok_or(DomainError::not_found("product"))?;
        if !self.users.contains_key(&request.user_id().get()) {
            return Err(DomainError::not_found("user").into());
        }
        let next_stock = apply_change(product.stock, request.change())?;

        let movement = StockMovement {
            // Placeholder until commit.
            id: MovementId::from_raw(0),
            product_id: request.product_id(),
            user_id: request.user_id(),
            movement_type: request.movement_type(),
            change: request.change(),
            reference_id: request.reference_id(),
            created_at: now,
        };
        Ok((movement, next_stock))
    }

    /// Run `f` as a unit. If it returns an error, products and movements
    /// are restored to what they were before the call. Id counters are not
    /// rewound, like database sequences.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let movements_len = self.movements.len();
        let products = self.products.clone();
        let result = f(self);
        if result.is_err() {
            self.movements.truncate(movements_len);
            self.products = products;
        }
        result
    }

    /// Append a staged movement, assigning its id.
    pub fn append_movement(&mut self, mut movement: StockMovement) -> MovementId {
        movement.id = self.next_movement_id();
        let id = movement.id;
        self.movements.push(movement);
        id
    }

    /// Write a product's cached balance.
    pub fn write_stock(
        &mut self,
        product_id: ProductId,
        stock: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let product = self
            .products
            .get_mut(&product_id.get())
            .ok_or(DomainError::not_found("product"))?;
        product.stock = stock;
        product.updated_at = now;
        Ok(product.clone())
    }
}

/// Handle to the shared in-memory tables. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    inner: Arc<Mutex<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database pre-loaded with a small set of catalog lookups.
    pub fn with_catalog_seed() -> Self {
        let db = Self::new();
        if let Ok(mut tables) = db.inner.lock() {
            tables.attributes = seed_attributes();
        }
        db
    }

    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.inner.lock().map_err(|_| StoreError::poisoned())
    }
}

fn seed_attributes() -> CatalogAttributes {
    let named = |items: &[(i64, &str)]| {
        items
            .iter()
            .map(|(id, name)| NamedRef {
                id: *id,
                name: name.to_string(),
            })
            .collect::<Vec<_>>()
    };
    let line = ProductLine {
        id: 1,
        name: "Adulto".to_string(),
        brand_id: 1,
    };
    CatalogAttributes {
        brands: named(&[(1, "Old Prince"), (2, "Excellent")]),
        animals: named(&[(1, "Perro"), (2, "Gato")]),
        lines: vec![line.clone()],
        sub_product_lines: vec![SubProductLine {
            id: 1,
            name: "Cordero y arroz".to_string(),
            product_line: line,
        }],
        animal_ages: named(&[(1, "Cachorro"), (2, "Adulto"), (3, "Senior")]),
        animal_sizes: named(&[(1, "Pequeño"), (2, "Mediano"), (3, "Grande")]),
    }
    .sorted()
}
