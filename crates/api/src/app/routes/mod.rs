use axum::{
    Router,
    routing::{get, post},
};

pub mod accounts;
pub mod products;
pub mod roles;
pub mod stock_movements;
pub mod system;
pub mod users;

/// Endpoints reachable without a session.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(accounts::login))
        .route("/register", post(accounts::register))
        .route("/verify-email", get(accounts::verify_email))
        .route(
            "/auth/resend-email-verification",
            post(accounts::resend_verification),
        )
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/stock-movements", stock_movements::router())
        .nest("/products", products::router())
        .nest("/users", users::router())
        .nest("/roles", roles::router())
}
