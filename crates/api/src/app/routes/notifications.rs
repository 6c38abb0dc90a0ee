//! Recipient-facing notification endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde_json::json;

use carelog_core::NotificationId;

use crate::app::{errors, services::AppServices};
use crate::context::CurrentAccount;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", put(mark_read))
}

/// GET /api/notifications - my notifications, newest first.
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
) -> axum::response::Response {
    match services.notifications.list_for(current.id()).await {
        Ok(notifications) => {
            (StatusCode::OK, Json(json!({ "data": notifications }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT /api/notifications/:id/read - recipient toggles the read flag.
pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let notification_id: NotificationId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid notification id",
            );
        }
    };

    match services
        .notifications
        .mark_read(notification_id, current.id())
        .await
    {
        Ok(true) => (StatusCode::OK, Json(json!({ "message": "marked as read" }))).into_response(),
        Ok(false) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "notification not found")
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
