use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use sabueso_inventory::{AdjustStock, MovementQuery, MovementView};
use sabueso_products::Product;

use super::StockLedger;
use crate::error::StoreError;
use crate::memory::InMemoryDatabase;

/// In-memory stock ledger.
///
/// Intended for tests/dev. Adjustments are serialized by the database mutex.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockLedger {
    db: InMemoryDatabase,
    #[cfg(test)]
    fault: Option<FaultPoint>,
}

impl InMemoryStockLedger {
    pub fn new(db: InMemoryDatabase) -> Self {
        Self {
            db,
            #[cfg(test)]
            fault: None,
        }
    }

    #[cfg(test)]
    fn with_fault(mut self, fault: FaultPoint) -> Self {
        self.fault = Some(fault);
        self
    }

    #[cfg(test)]
    fn fail_at(&self, point: FaultPoint) -> Result<(), StoreError> {
        if self.fault == Some(point) {
            return Err(StoreError::storage(format!("injected fault: {point:?}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn fail_at(&self, _point: FaultPoint) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Points inside `adjust` where tests can make it fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FaultPoint {
    /// After the movement row is appended, before the balance is written.
    AfterMovementInsert,
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn adjust(&self, request: AdjustStock) -> Result<Product, StoreError> {
        let now = Utc::now();
        let mut tables = self.db.lock()?;
        let product = tables.transaction(|tx| {
            let (movement, next_stock) = tx.stage_adjust(&request, now)?;
            tx.append_movement(movement);
            self.fail_at(FaultPoint::AfterMovementInsert)?;
            tx.write_stock(request.product_id(), next_stock, now)
        })?;
        debug!(
            product_id = %product.id,
            change = request.change(),
            stock = product.stock,
            "stock adjusted"
        );
        Ok(product)
    }

    async fn movements(&self, query: MovementQuery) -> Result<Vec<MovementView>, StoreError> {
        let tables = self.db.lock()?;
        let mut rows: Vec<_> = tables
            .movements
            .iter()
            .filter(|m| query.product_id.is_none_or(|p| m.product_id == p))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .take(query.limit as usize)
            .map(|m| MovementView {
                movement: m.clone(),
                username: tables
                    .users
                    .get(&m.user_id.get())
                    .map(|u| u.user.username.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sabueso_core::{DomainError, ProductId, UserId};
    use sabueso_inventory::{MovementType, ledger_balance};

    use super::*;
    use crate::test_support::seed_product;

    fn adjust(product: ProductId, user: UserId, kind: MovementType, change: i64) -> AdjustStock {
        AdjustStock::new(product.get(), user, kind, change, None).unwrap()
    }

    fn balance_matches_ledger(db: &InMemoryDatabase, product: ProductId) -> (i64, i64) {
        let tables = db.lock().unwrap();
        let stock = tables.products[&product.get()].stock;
        let sum = ledger_balance(tables.movements.iter().filter(|m| m.product_id == product));
        (stock, sum)
    }

    #[tokio::test]
    async fn decrease_within_stock_is_applied_and_recorded() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 10).await;
        let ledger = InMemoryStockLedger::new(db.clone());

        let updated = ledger
            .adjust(adjust(product, user, MovementType::AdjustMinus, -3))
            .await
            .unwrap();
        assert_eq!(updated.stock, 7);

        let rows = ledger
            .movements(MovementQuery {
                product_id: Some(product),
                limit: 50,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].movement.change, -3);
        assert_eq!(rows[0].movement.movement_type, MovementType::AdjustMinus);
        assert_eq!(rows[0].movement.reference_id, 0);
        assert_eq!(rows[0].username, "deposito");
        assert_eq!(balance_matches_ledger(&db, product), (7, 7));
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_writes() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 2).await;
        let ledger = InMemoryStockLedger::new(db.clone());

        let err = ledger
            .adjust(adjust(product, user, MovementType::AdjustMinus, -5))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Domain(DomainError::insufficient_stock(2, -5)));

        let tables = db.lock().unwrap();
        assert_eq!(tables.products[&product.get()].stock, 2);
        assert_eq!(tables.movements.len(), 1);
    }

    #[tokio::test]
    async fn increase_from_zero() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 0).await;
        let ledger = InMemoryStockLedger::new(db.clone());

        let updated = ledger
            .adjust(
                AdjustStock::new(product.get(), user, MovementType::PurchaseIn, 12, Some(88))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 12);
        assert_eq!(balance_matches_ledger(&db, product), (12, 12));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (_, user) = seed_product(&db, 0).await;
        let ledger = InMemoryStockLedger::new(db.clone());

        let err = ledger
            .adjust(adjust(ProductId::from_raw(999), user, MovementType::AdjustPlus, 1))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Domain(DomainError::not_found("product")));
        assert!(db.lock().unwrap().movements.is_empty());
    }

    #[tokio::test]
    async fn fault_after_movement_insert_leaves_no_trace() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 5).await;
        let before = db.lock().unwrap().products[&product.get()].clone();

        let ledger =
            InMemoryStockLedger::new(db.clone()).with_fault(FaultPoint::AfterMovementInsert);
        let err = ledger
            .adjust(adjust(product, user, MovementType::AdjustPlus, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        {
            let tables = db.lock().unwrap();
            assert_eq!(tables.products[&product.get()], before);
            assert_eq!(tables.movements.len(), 1);
        }

        // The next adjustment sees the pre-fault state.
        let updated = InMemoryStockLedger::new(db.clone())
            .adjust(adjust(product, user, MovementType::AdjustMinus, -5))
            .await
            .unwrap();
        assert_eq!(updated.stock, 0);
        assert_eq!(balance_matches_ledger(&db, product), (0, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decreases_never_overdraw() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 10).await;
        let ledger = Arc::new(InMemoryStockLedger::new(db.clone()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .adjust(adjust(product, user, MovementType::AdjustMinus, -1))
                    .await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Domain(DomainError::InsufficientStock { .. })) => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(ok, 10);
        assert_eq!(insufficient, 10);
        assert_eq!(balance_matches_ledger(&db, product), (0, 0));
    }

    #[tokio::test]
    async fn movements_are_newest_first_and_limited() {
        let db = InMemoryDatabase::with_catalog_seed();
        let (product, user) = seed_product(&db, 1).await;
        let ledger = InMemoryStockLedger::new(db.clone());
        for change in [2, 3, -1] {
            let kind = if change > 0 {
                MovementType::AdjustPlus
            } else {
                MovementType::AdjustMinus
            };
            ledger.adjust(adjust(product, user, kind, change)).await.unwrap();
        }

        let rows = ledger
            .movements(MovementQuery {
                product_id: None,
                limit: 2,
            })
            .await
            .unwrap();
        let changes: Vec<i64> = rows.iter().map(|r| r.movement.change).collect();
        assert_eq!(changes, vec![-1, 3]);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig { cases: 64, ..Default::default() })]

        #[test]
        fn random_adjustments_keep_balance_equal_to_ledger(
            initial in 0i64..50,
            changes in proptest::collection::vec(-20i64..20, 1..40),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let db = InMemoryDatabase::with_catalog_seed();
                let (product, user) = seed_product(&db, initial).await;
                let ledger = InMemoryStockLedger::new(db.clone());

                let mut expected = initial;
                for change in changes.into_iter().filter(|c| *c != 0) {
                    let kind = if change > 0 { MovementType::AdjustPlus } else { MovementType::AdjustMinus };
                    match ledger.adjust(adjust(product, user, kind, change)).await {
                        Ok(p) => {
                            expected += change;
                            assert_eq!(p.stock, expected);
                        }
                        Err(StoreError::Domain(DomainError::InsufficientStock { available, .. })) => {
                            assert_eq!(available, expected);
                            assert!(expected + change < 0);
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                    let (stock, sum) = balance_matches_ledger(&db, product);
                    assert_eq!(stock, sum);
                    assert!(stock >= 0);
                }
            });
        }
    }
}
