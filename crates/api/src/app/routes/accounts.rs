//! Public account endpoints: login, self-registration, email verification.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use sabueso_auth::Registration;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let req: dto::LoginRequest = match dto::parse_body(body) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let principal = match services.accounts.authenticate(&req.username, &req.password).await {
        Ok(p) => p,
        Err(e) => return errors::store_error_to_response(e),
    };

    let (token, expires_at) = match services.issue_session(&principal, Utc::now()) {
        Ok(v) => v,
        Err(e) => return errors::token_error_to_response(e),
    };

    tracing::info!(user_id = %principal.user_id, role = %principal.role, "session issued");
    (
        StatusCode::OK,
        Json(dto::SessionResponse {
            token,
            expires_at,
            user_id: principal.user_id,
            role: principal.role,
            email_verified: principal.email_verified,
        }),
    )
        .into_response()
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let registration: Registration = match dto::parse_body(body) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.accounts.register(registration).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::VerifyEmailParams>,
) -> axum::response::Response {
    match services.accounts.verify_email(&params.token, Utc::now()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "verified": true })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn resend_verification(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let req: dto::ResendVerificationRequest = match dto::parse_body(body) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.accounts.resend_verification(&req.email).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "sent": true }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
