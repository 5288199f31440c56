use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use sabueso_auth::{Action, role_definitions};

use crate::app::errors;
use crate::authz::authorize_action;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_roles))
}

/// Fixed role set with ids and granted actions.
pub async fn list_roles(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::RolesRead) {
        return errors::authz_error_to_response(e);
    }

    (StatusCode::OK, Json(role_definitions())).into_response()
}
