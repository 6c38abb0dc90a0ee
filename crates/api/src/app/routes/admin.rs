//! Admin routes: account review and the dashboard.
//!
//! The whole group sits behind the admin guard.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use carelog_core::AccountId;
use carelog_identity::AccountStatus;

use crate::app::{errors, services::AppServices};
use crate::middleware;

pub fn router() -> Router {
    Router::new()
        .route("/users/pending", get(list_pending_users))
        .route("/users/:id/review", put(review_user))
        .route("/dashboard", get(dashboard))
        .route_layer(axum::middleware::from_fn(middleware::require_admin))
}

/// GET /api/admin/users/pending - accounts awaiting review.
pub async fn list_pending_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.accounts.list_by_status(AccountStatus::Inactive).await {
        Ok(users) => (StatusCode::OK, Json(json!({ "data": users }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ReviewUserRequest {
    pub action: ReviewAction,
    pub reject_reason: Option<String>,
}

/// PUT /api/admin/users/:id/review - approve or reject a pending account.
///
/// Emits `AccountStatus` to the reviewed account either way.
pub async fn review_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ReviewUserRequest>,
) -> axum::response::Response {
    let account_id: AccountId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id");
        }
    };

    let mut account = match services.accounts.get(account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    match body.action {
        ReviewAction::Approve => account.approve(Utc::now()),
        ReviewAction::Reject => {
            let reason = body.reject_reason.unwrap_or_default();
            if let Err(e) = account.reject(&reason, Utc::now()) {
                return errors::domain_error_to_response(e);
            }
        }
    }

    if let Err(e) = services.accounts.update(&account).await {
        return errors::store_error_to_response(e);
    }

    services.dispatcher.account_status(&account).await;

    (
        StatusCode::OK,
        Json(json!({
            "message": "account status updated",
            "new_status": account.status,
        })),
    )
        .into_response()
}

/// GET /api/admin/dashboard - headline counts.
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let total_users = match services.accounts.count().await {
        Ok(count) => count,
        Err(e) => return errors::store_error_to_response(e),
    };
    let total_patients = match services.patients.count().await {
        Ok(count) => count,
        Err(e) => return errors::store_error_to_response(e),
    };
    let incidents_all_time = match services.sessions.count_incidents(None).await {
        Ok(count) => count,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "total_users": total_users,
            "total_patients": total_patients,
            "incidents_all_time": incidents_all_time,
        })),
    )
        .into_response()
}
