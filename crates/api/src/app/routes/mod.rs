use axum::Router;

pub mod admin;
pub mod auth;
pub mod collaborations;
pub mod notifications;
pub mod patients;
pub mod sessions;
pub mod system;

/// Router for all authenticated endpoints (nested under `/api`).
pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/patients", patients::router())
        .nest("/sessions", sessions::router())
        .nest("/collaborations", collaborations::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
