use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sabueso_core::{DomainError, DomainResult, MovementId, ProductId, UserId};

/// Reason code of a stock movement.
///
/// Persisted by numeric id (the `movement_types` table key); accepted on the
/// wire as either the snake_case name or the id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    PurchaseIn,
    AdjustPlus,
    AdjustMinus,
    ReturnIn,
}

impl MovementType {
    pub const ALL: [MovementType; 4] = [
        MovementType::PurchaseIn,
        MovementType::AdjustPlus,
        MovementType::AdjustMinus,
        MovementType::ReturnIn,
    ];

    pub fn id(&self) -> i32 {
        match self {
            MovementType::PurchaseIn => 1,
            MovementType::AdjustPlus => 2,
            MovementType::AdjustMinus => 3,
            MovementType::ReturnIn => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::PurchaseIn => "purchase_in",
            MovementType::AdjustPlus => "adjust_plus",
            MovementType::AdjustMinus => "adjust_minus",
            MovementType::ReturnIn => "return_in",
        }
    }

    pub fn from_id(id: i64) -> DomainResult<Self> {
        MovementType::ALL
            .into_iter()
            .find(|t| i64::from(t.id()) == id)
            .ok_or_else(|| DomainError::validation(format!("unknown movementType id {id}")))
    }

    pub fn from_name(name: &str) -> DomainResult<Self> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == name.trim())
            .ok_or_else(|| DomainError::validation(format!("unknown movementType '{name}'")))
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated stock adjustment, ready for the ledger.
///
/// Only constructible through [`AdjustStock::new`], so a value of this type
/// always has a positive product id and a non-zero change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustStock {
    product_id: ProductId,
    user_id: UserId,
    movement_type: MovementType,
    change: i64,
    reference_id: i64,
}

impl AdjustStock {
    pub fn new(
        product_id: i64,
        user_id: UserId,
        movement_type: MovementType,
        change: i64,
        reference_id: Option<i64>,
    ) -> DomainResult<Self> {
        let product_id = ProductId::parse(product_id)?;
        if change == 0 {
            return Err(DomainError::validation("change cannot be zero"));
        }
        // Opaque external key; any integer is stored as given.
        let reference_id = reference_id.unwrap_or(0);
        Ok(Self {
            product_id,
            user_id,
            movement_type,
            change,
            reference_id,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn movement_type(&self) -> MovementType {
        self.movement_type
    }

    pub fn change(&self) -> i64 {
        self.change
    }

    pub fn reference_id(&self) -> i64 {
        self.reference_id
    }

    pub fn is_decrease(&self) -> bool {
        self.change < 0
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub movement_type: MovementType,
    pub change: i64,
    pub reference_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Ledger row as returned by the ledger query: the movement plus the acting
/// user's display identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub username: String,
}

/// Ledger query: optional product filter and a bounded result count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MovementQuery {
    pub product_id: Option<ProductId>,
    pub limit: u32,
}

impl MovementQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(product_id: Option<i64>, limit: Option<i64>) -> DomainResult<Self> {
        let product_id = product_id.map(ProductId::parse).transpose()?;
        let limit = match limit {
            None => Self::DEFAULT_LIMIT,
            Some(l) if l < 1 => return Err(DomainError::validation("limit must be at least 1")),
            Some(l) => l.min(i64::from(Self::MAX_LIMIT)) as u32,
        };
        Ok(Self { product_id, limit })
    }
}

impl Default for MovementQuery {
    fn default() -> Self {
        Self {
            product_id: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// The balance rule: the stock that results from applying `change` to
/// `current`, or why it cannot be applied.
pub fn apply_change(current: i64, change: i64) -> DomainResult<i64> {
    let next = current
        .checked_add(change)
        .ok_or_else(|| DomainError::validation("stock change overflows"))?;
    if next < 0 {
        return Err(DomainError::insufficient_stock(current, change));
    }
    Ok(next)
}

/// Balance derived from a product's ledger (sum of all changes).
pub fn ledger_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
    movements.into_iter().map(|m| m.change).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn actor() -> UserId {
        UserId::from_raw(1)
    }

    #[test]
    fn zero_change_is_a_validation_error() {
        let err = AdjustStock::new(1, actor(), MovementType::AdjustPlus, 0, None).unwrap_err();
        assert_eq!(err, DomainError::validation("change cannot be zero"));
    }

    #[test]
    fn non_positive_product_id_is_rejected() {
        let err = AdjustStock::new(0, actor(), MovementType::PurchaseIn, 5, None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reference_id_defaults_to_zero() {
        let cmd = AdjustStock::new(9, actor(), MovementType::ReturnIn, 3, None).unwrap();
        assert_eq!(cmd.reference_id(), 0);
        assert_eq!(cmd.product_id(), ProductId::from_raw(9));
        assert!(!cmd.is_decrease());
    }

    #[test]
    fn negative_reference_id_is_kept_verbatim() {
        let cmd = AdjustStock::new(1, actor(), MovementType::SaleOut, -3, Some(-17)).unwrap();
        assert_eq!(cmd.reference_id(), -17);
    }

    #[test]
    fn movement_type_accepts_names_and_ids() {
        assert_eq!(MovementType::from_name("adjust_minus").unwrap(), MovementType::AdjustMinus);
        assert_eq!(MovementType::from_id(1).unwrap(), MovementType::PurchaseIn);
        assert!(MovementType::from_name("gift").is_err());
        assert!(MovementType::from_id(0).is_err());
    }

    #[test]
    fn decrease_to_exactly_zero_is_allowed() {
        assert_eq!(apply_change(50, -50).unwrap(), 0);
        assert_eq!(
            apply_change(0, -1).unwrap_err(),
            DomainError::insufficient_stock(0, -1)
        );
    }

    #[test]
    fn over_withdrawal_reports_available_stock() {
        match apply_change(120, -150) {
            Err(DomainError::InsufficientStock { available, requested }) => {
                assert_eq!(available, 120);
                assert_eq!(requested, -150);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[test]
    fn query_limit_defaults_and_clamps() {
        assert_eq!(MovementQuery::new(None, None).unwrap().limit, 50);
        assert_eq!(MovementQuery::new(None, Some(10_000)).unwrap().limit, 500);
        assert!(MovementQuery::new(None, Some(0)).is_err());
        assert!(MovementQuery::new(Some(-1), None).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: applying any sequence of changes through the balance rule
        /// (skipping rejected ones) never goes negative, and the balance equals
        /// the sum of the accepted changes.
        #[test]
        fn balance_equals_sum_of_accepted_changes(
            start in 0i64..1_000,
            changes in prop::collection::vec(-500i64..500i64, 1..40)
        ) {
            let mut stock = start;
            let mut accepted: i64 = 0;

            for change in changes.into_iter().filter(|c| *c != 0) {
                match apply_change(stock, change) {
                    Ok(next) => {
                        stock = next;
                        accepted += change;
                    }
                    Err(DomainError::InsufficientStock { available, .. }) => {
                        prop_assert_eq!(available, stock);
                        prop_assert!(stock + change < 0);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {e:?}"),
                }
                prop_assert!(stock >= 0);
            }

            prop_assert_eq!(stock, start + accepted);
        }
    }
}
