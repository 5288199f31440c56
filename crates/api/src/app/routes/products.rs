use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use sabueso_auth::Action;
use sabueso_core::ProductId;
use sabueso_products::{NewProduct, validate_barcode};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_action;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/check-barcode", get(check_barcode))
        .route("/attributes", get(get_attributes))
        .route("/:id", get(get_product).put(update_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsRead) {
        return errors::authz_error_to_response(e);
    }

    match services.catalog.list_products().await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Create a product. A non-zero `initial_stock` is recorded as a
/// `purchase_in` movement by the caller.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsWrite) {
        return errors::authz_error_to_response(e);
    }

    let product: NewProduct = match dto::parse_body(body) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .catalog
        .create_product(product, principal.user_id())
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsRead) {
        return errors::authz_error_to_response(e);
    }

    let id = match id.parse::<ProductId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsWrite) {
        return errors::authz_error_to_response(e);
    }

    let parsed = id.parse::<ProductId>()
        .and_then(|id| dto::parse_product_update(body).map(|update| (id, update)));
    let (id, update) = match parsed {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.update_product(id, update).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Whether a barcode is free to use, and the product holding it if not.
pub async fn check_barcode(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::BarcodeParams>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsRead) {
        return errors::authz_error_to_response(e);
    }

    let barcode = match validate_barcode(&params.barcode) {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.find_by_barcode(&barcode).await {
        Ok(existing) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "barcode": barcode,
                "available": existing.is_none(),
                "product_id": existing.map(|p| p.id),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_attributes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::ProductsRead) {
        return errors::authz_error_to_response(e);
    }

    match services.catalog.attributes().await {
        Ok(attributes) => (StatusCode::OK, Json(attributes)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
