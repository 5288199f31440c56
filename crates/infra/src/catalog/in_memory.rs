use async_trait::async_trait;
use chrono::Utc;

use sabueso_core::{DomainError, ProductId, UserId};
use sabueso_inventory::{AdjustStock, MovementType};
use sabueso_products::{CatalogAttributes, NewProduct, Product, ProductUpdate, validate_barcode};

use super::ProductCatalog;
use crate::error::StoreError;
use crate::memory::{InMemoryDatabase, Tables};

/// In-memory product catalog sharing tables with the in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    db: InMemoryDatabase,
}

impl InMemoryProductCatalog {
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }
}

fn ensure_unique_barcode(
    tables: &Tables,
    barcode: Option<&str>,
    except: Option<ProductId>,
) -> Result<(), StoreError> {
    let Some(barcode) = barcode else {
        return Ok(());
    };
    let taken = tables
        .products
        .values()
        .any(|p| Some(p.id) != except && p.barcode.as_deref() == Some(barcode));
    if taken {
        return Err(DomainError::conflict(format!("barcode {barcode} already exists")).into());
    }
    Ok(())
}

/// Catalog attribute ids a product points at. `None` means unchanged or
/// unset, so nothing to check.
#[derive(Debug, Default)]
struct AttributeRefs {
    brand: Option<i64>,
    animal: Option<i64>,
    line: Option<i64>,
    sub_line: Option<i64>,
    age: Option<i64>,
    size: Option<i64>,
}

impl AttributeRefs {
    fn of_new(product: &NewProduct) -> Self {
        Self {
            brand: Some(product.brand_id),
            animal: Some(product.animal_id),
            line: product.product_line_id,
            sub_line: product.sub_product_line_id,
            age: product.animal_age_id,
            size: product.animal_size_id,
        }
    }

    fn of_update(update: &ProductUpdate) -> Self {
        Self {
            brand: update.brand_id,
            animal: update.animal_id,
            line: update.product_line_id.flatten(),
            sub_line: update.sub_product_line_id.flatten(),
            age: update.animal_age_id.flatten(),
            size: update.animal_size_id.flatten(),
        }
    }

    /// Same outcome as the foreign keys of the relational schema.
    fn ensure_exist(&self, attrs: &CatalogAttributes) -> Result<(), StoreError> {
        fn check(
            field: &str,
            id: Option<i64>,
            mut known: impl Iterator<Item = i64>,
        ) -> Result<(), StoreError> {
            match id {
                Some(id) if !known.any(|k| k == id) => Err(DomainError::validation(format!(
                    "referenced record does not exist ({field})"
                ))
                .into()),
                _ => Ok(()),
            }
        }
        check("brand_id", self.brand, attrs.brands.iter().map(|b| b.id))?;
        check("animal_id", self.animal, attrs.animals.iter().map(|a| a.id))?;
        check("product_line_id", self.line, attrs.lines.iter().map(|l| l.id))?;
        check(
            "sub_product_line_id",
            self.sub_line,
            attrs.sub_product_lines.iter().map(|l| l.id),
        )?;
        check("animal_age_id", self.age, attrs.animal_ages.iter().map(|a| a.id))?;
        check("animal_size_id", self.size, attrs.animal_sizes.iter().map(|a| a.id))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.db.lock()?;
        Ok(tables
            .products
            .values()
            .filter(|p| !p.is_deleted)
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let tables = self.db.lock()?;
        tables
            .products
            .get(&id.get())
            .cloned()
            .ok_or_else(|| DomainError::not_found("product").into())
    }

    async fn create_product(&self, product: NewProduct, actor: UserId) -> Result<Product, StoreError> {
        let product = product.normalized()?;
        let mut tables = self.db.lock()?;
        ensure_unique_barcode(&tables, product.barcode.as_deref(), None)?;
        AttributeRefs::of_new(&product).ensure_exist(&tables.attributes)?;

        let now = Utc::now();
        tables.transaction(|tx| {
            let id = tx.next_product_id();
            let created = Product {
                id,
                name: product.name,
                description: product.description,
                sku: product.sku,
                barcode: product.barcode,
                stock: 0,
                retail_price: product.retail_price,
                wholesale_price: product.wholesale_price,
                weight: product.weight,
                extra_weight: product.extra_weight,
                brand_id: product.brand_id,
                animal_id: product.animal_id,
                product_line_id: product.product_line_id,
                sub_product_line_id: product.sub_product_line_id,
                animal_age_id: product.animal_age_id,
                animal_size_id: product.animal_size_id,
                created_at: now,
                updated_at: now,
                is_deleted: false,
            };
            tx.products.insert(id.get(), created.clone());
            if product.initial_stock == 0 {
                return Ok(created);
            }

            let initial = AdjustStock::new(
                id.get(),
                actor,
                MovementType::PurchaseIn,
                product.initial_stock,
                None,
            )?;
            let (movement, next_stock) = tx.stage_adjust(&initial, now)?;
            tx.append_movement(movement);
            tx.write_stock(id, next_stock, now)
        })
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, StoreError> {
        let update = update.normalized()?;
        let mut tables = self.db.lock()?;
        if let Some(Some(barcode)) = &update.barcode {
            ensure_unique_barcode(&tables, Some(barcode.as_str()), Some(id))?;
        }
        AttributeRefs::of_update(&update).ensure_exist(&tables.attributes)?;
        let product = tables
            .products
            .get_mut(&id.get())
            .ok_or(DomainError::not_found("product"))?;
        update.apply_to(product, Utc::now());
        Ok(product.clone())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let barcode = validate_barcode(barcode)?;
        let tables = self.db.lock()?;
        Ok(tables
            .products
            .values()
            .find(|p| p.barcode.as_deref() == Some(barcode.as_str()))
            .cloned())
    }

    async fn attributes(&self) -> Result<CatalogAttributes, StoreError> {
        Ok(self.db.lock()?.attributes.clone())
    }
}

#[cfg(test)]
mod tests {
    use sabueso_inventory::ledger_balance;

    use super::*;
    use crate::test_support::{new_product, seed_user};

    #[tokio::test]
    async fn initial_stock_is_recorded_as_purchase() {
        let db = InMemoryDatabase::with_catalog_seed();
        let user = seed_user(&db).await;
        let catalog = InMemoryProductCatalog::new(db.clone());

        let product = catalog.create_product(new_product(100), user).await.unwrap();
        assert_eq!(product.stock, 100);

        let tables = db.lock().unwrap();
        assert_eq!(tables.movements.len(), 1);
        assert_eq!(tables.movements[0].movement_type, MovementType::PurchaseIn);
        assert_eq!(tables.movements[0].user_id, user);
        assert_eq!(ledger_balance(&tables.movements), 100);
    }

    #[tokio::test]
    async fn initial_stock_with_unknown_actor_inserts_nothing() {
        let db = InMemoryDatabase::with_catalog_seed();
        let catalog = InMemoryProductCatalog::new(db.clone());

        let err = catalog
            .create_product(new_product(5), UserId::from_raw(42))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Domain(DomainError::not_found("user")));

        let tables = db.lock().unwrap();
        assert!(tables.products.is_empty());
        assert!(tables.movements.is_empty());
    }

    #[tokio::test]
    async fn update_never_touches_stock() {
        let db = InMemoryDatabase::with_catalog_seed();
        let user = seed_user(&db).await;
        let catalog = InMemoryProductCatalog::new(db.clone());
        let product = catalog.create_product(new_product(7), user).await.unwrap();

        let updated = catalog
            .update_product(
                product.id,
                ProductUpdate {
                    name: Some("Renamed".to_string()),
                    barcode: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.barcode, None);
        assert_eq!(updated.stock, 7);
    }

    #[tokio::test]
    async fn unknown_catalog_references_are_rejected() {
        let db = InMemoryDatabase::with_catalog_seed();
        let user = seed_user(&db).await;
        let catalog = InMemoryProductCatalog::new(db.clone());

        let err = catalog
            .create_product(
                NewProduct {
                    brand_id: 999,
                    ..new_product(3)
                },
                user,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Domain(DomainError::validation(
                "referenced record does not exist (brand_id)"
            ))
        );
        {
            let tables = db.lock().unwrap();
            assert!(tables.products.is_empty());
            assert!(tables.movements.is_empty());
        }

        let product = catalog.create_product(new_product(3), user).await.unwrap();
        let err = catalog
            .update_product(
                product.id,
                ProductUpdate {
                    animal_size_id: Some(Some(77)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert_eq!(catalog.get_product(product.id).await.unwrap(), product);

        let updated = catalog
            .update_product(
                product.id,
                ProductUpdate {
                    animal_size_id: Some(Some(2)),
                    product_line_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.animal_size_id, Some(2));
        assert_eq!(updated.product_line_id, None);
        assert_eq!(updated.stock, 3);
    }

    #[tokio::test]
    async fn duplicate_barcode_conflicts() {
        let db = InMemoryDatabase::with_catalog_seed();
        let user = seed_user(&db).await;
        let catalog = InMemoryProductCatalog::new(db.clone());
        catalog.create_product(new_product(0), user).await.unwrap();

        let err = catalog.create_product(new_product(0), user).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn barcode_lookup_and_deleted_products() {
        let db = InMemoryDatabase::with_catalog_seed();
        let user = seed_user(&db).await;
        let catalog = InMemoryProductCatalog::new(db.clone());
        let product = catalog.create_product(new_product(0), user).await.unwrap();

        let found = catalog.find_by_barcode("7791234567890").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(product.id));
        assert!(catalog.find_by_barcode("abc").await.is_err());

        catalog
            .update_product(
                product.id,
                ProductUpdate {
                    is_deleted: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(catalog.list_products().await.unwrap().is_empty());
        assert!(catalog.get_product(product.id).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn attributes_are_sorted_by_name() {
        let catalog = InMemoryProductCatalog::new(InMemoryDatabase::with_catalog_seed());
        let attrs = catalog.attributes().await.unwrap();
        let brands: Vec<&str> = attrs.brands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(brands, vec!["Excellent", "Old Prince"]);
        assert_eq!(attrs.sub_product_lines[0].product_line.name, "Adulto");
    }
}
