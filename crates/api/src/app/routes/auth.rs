//! Self-service account endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::app::{errors, services::AppServices};
use crate::context::CurrentAccount;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_profile))
}

/// GET /api/auth/me - the authenticated account.
pub async fn me(Extension(current): Extension<CurrentAccount>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(json!({ "user": current.account() })),
    )
        .into_response()
}

/// Known self-service profile fields; anything else the client sends is
/// ignored rather than stored.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
}

/// PUT /api/auth/profile - merge profile fields.
///
/// Deliberately reachable while the account is still pending approval.
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Json(body): Json<UpdateProfileRequest>,
) -> axum::response::Response {
    let mut patch = Map::new();
    let fields = [
        ("full_name", body.full_name),
        ("specialty", body.specialty),
        ("phone", body.phone),
        ("gender", body.gender),
        ("bio", body.bio),
        ("birth_date", body.birth_date),
    ];
    for (key, value) in fields {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            patch.insert(key.to_string(), Value::String(value));
        }
    }

    let mut account = current.account().clone();
    account.merge_profile(patch, Utc::now());

    if let Err(e) = services.accounts.update(&account).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": "profile updated",
            "data": account.profile,
        })),
    )
        .into_response()
}
