use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use sabueso_auth::{Action, NewUser, UserUpdate};
use sabueso_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_action;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::UsersRead) {
        return errors::authz_error_to_response(e);
    }

    match services.users.list_users().await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::UsersWrite) {
        return errors::authz_error_to_response(e);
    }

    let user: NewUser = match dto::parse_body(body) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.users.create_user(user).await {
        Ok(created) => {
            tracing::info!(user_id = %created.id, created_by = %principal.user_id(), "user created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::UsersRead) {
        return errors::authz_error_to_response(e);
    }

    let id = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.users.get_user(id).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(e) = authorize_action(&principal, Action::UsersWrite) {
        return errors::authz_error_to_response(e);
    }

    let parsed = id.parse::<UserId>()
        .and_then(|id| dto::parse_body::<UserUpdate>(body).map(|update| (id, update)));
    let (id, update) = match parsed {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.users.update_user(id, update).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
