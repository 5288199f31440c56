use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sabueso_core::{DomainError, DomainResult, UserId};
use sabueso_inventory::{AdjustStock, MovementQuery, MovementType, MovementView};
use sabueso_products::ProductUpdate;

// -------------------------
// Request DTOs
// -------------------------

/// `movementType` is accepted as the snake_case name or the numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MovementTypeInput {
    Id(i64),
    Name(String),
}

impl MovementTypeInput {
    pub fn resolve(&self) -> DomainResult<MovementType> {
        match self {
            MovementTypeInput::Id(id) => MovementType::from_id(*id),
            MovementTypeInput::Name(name) => MovementType::from_name(name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: i64,
    pub movement_type: MovementTypeInput,
    pub change: i64,
    #[serde(default)]
    pub reference_id: Option<i64>,
}

impl AdjustStockRequest {
    /// Validate into a ledger command acted by `user_id`.
    pub fn into_command(self, user_id: UserId) -> DomainResult<AdjustStock> {
        let movement_type = self.movement_type.resolve()?;
        AdjustStock::new(
            self.product_id,
            user_id,
            movement_type,
            self.change,
            self.reference_id,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsParams {
    pub product_id: Option<i64>,
    pub limit: Option<i64>,
}

impl MovementsParams {
    pub fn into_query(self) -> DomainResult<MovementQuery> {
        MovementQuery::new(self.product_id, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct BarcodeParams {
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Decode a JSON body after authorization, so malformed bodies surface as
/// `validation_error` rather than an extractor rejection.
pub fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> DomainResult<T> {
    serde_json::from_value(body).map_err(|e| DomainError::validation(format!("invalid body: {e}")))
}

/// Product edits cannot carry `stock`; stock changes go through
/// `POST /stock-movements`.
pub fn parse_product_update(body: serde_json::Value) -> DomainResult<ProductUpdate> {
    if body.get("stock").is_some() {
        return Err(DomainError::validation(
            "stock cannot be edited directly; record a stock movement instead",
        ));
    }
    parse_body(body)
}

// -------------------------
// Response DTOs
// -------------------------

/// One ledger row: the movement, its type by id and name, and who made it.
#[derive(Debug, Clone, Serialize)]
pub struct MovementResponse {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub username: String,
    pub movement_type_id: i32,
    pub movement_type: &'static str,
    pub change: i64,
    pub reference_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<MovementView> for MovementResponse {
    fn from(view: MovementView) -> Self {
        let m = view.movement;
        Self {
            id: m.id.get(),
            product_id: m.product_id.get(),
            user_id: m.user_id.get(),
            username: view.username,
            movement_type_id: m.movement_type.id(),
            movement_type: m.movement_type.as_str(),
            change: m.change,
            reference_id: m.reference_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: UserId,
    pub role: sabueso_auth::Role,
    pub email_verified: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn movement_type_accepts_name_or_id() {
        let by_name: AdjustStockRequest = serde_json::from_value(json!({
            "productId": 4, "movementType": "adjust_minus", "change": -2
        }))
        .unwrap();
        let by_id: AdjustStockRequest = serde_json::from_value(json!({
            "productId": 4, "movementType": 3, "change": -2, "referenceId": 11
        }))
        .unwrap();

        let a = by_name.into_command(UserId::from_raw(1)).unwrap();
        let b = by_id.into_command(UserId::from_raw(1)).unwrap();
        assert_eq!(a.movement_type(), MovementType::AdjustMinus);
        assert_eq!(b.movement_type(), MovementType::AdjustMinus);
        assert_eq!(a.reference_id(), 0);
        assert_eq!(b.reference_id(), 11);
    }

    #[test]
    fn unknown_movement_type_or_zero_change_is_a_validation_error() {
        let unknown = AdjustStockRequest {
            product_id: 1,
            movement_type: MovementTypeInput::Name("gift".to_string()),
            change: 1,
            reference_id: None,
        };
        assert!(matches!(
            unknown.into_command(UserId::from_raw(1)),
            Err(DomainError::Validation(_))
        ));

        let zero = AdjustStockRequest {
            product_id: 1,
            movement_type: MovementTypeInput::Id(2),
            change: 0,
            reference_id: None,
        };
        assert!(matches!(
            zero.into_command(UserId::from_raw(1)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn product_update_with_stock_is_rejected() {
        let err = parse_product_update(json!({ "name": "x", "stock": 99 })).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let update = parse_product_update(json!({ "name": "x", "barcode": null })).unwrap();
        assert_eq!(update.name.as_deref(), Some("x"));
        assert_eq!(update.barcode, Some(None));
    }
}
