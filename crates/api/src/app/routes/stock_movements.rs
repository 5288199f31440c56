//! The stock ledger over HTTP: record a movement, read the ledger.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use sabueso_auth::Action;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_action;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_movements).post(adjust_stock))
}

/// Apply a signed stock change and return the updated product.
///
/// Order: authorization, then request validation, then the ledger.
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::StockAdjust) {
        return errors::authz_error_to_response(e);
    }

    let cmd = match dto::parse_body::<dto::AdjustStockRequest>(body)
        .and_then(|req| req.into_command(principal.user_id()))
    {
        Ok(cmd) => cmd,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.adjust(cmd).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::MovementsParams>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::StockRead) {
        return errors::authz_error_to_response(e);
    }

    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.movements(query).await {
        Ok(rows) => {
            let rows: Vec<dto::MovementResponse> = rows.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(rows)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
