//! Collaboration invitations.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;

use carelog_collab::InviteDecision;
use carelog_core::{InviteId, PatientId};

use crate::app::{errors, services::AppServices};
use crate::context::CurrentAccount;

pub fn router() -> Router {
    Router::new()
        .route("/invite", post(invite))
        .route("/:id/respond", put(respond))
        .route("/pending", get(list_pending))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub patient_id: String,
    pub email: String,
}

/// POST /api/collaborations/invite
pub async fn invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Json(body): Json<InviteRequest>,
) -> axum::response::Response {
    let patient_id: PatientId = match body.patient_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid patient id");
        }
    };

    match services
        .collab
        .invite(patient_id, current.account(), &body.email)
        .await
    {
        Ok(invite) => (
            StatusCode::CREATED,
            Json(json!({ "message": "invitation sent", "data": invite })),
        )
            .into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: InviteDecision,
}

/// PUT /api/collaborations/:id/respond
pub async fn respond(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> axum::response::Response {
    let invite_id: InviteId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invitation id");
        }
    };

    match services
        .collab
        .respond(invite_id, current.account(), body.status)
        .await
    {
        Ok(invite) => (
            StatusCode::OK,
            Json(json!({
                "message": "invitation updated",
                "status": invite.status,
                "data": invite,
            })),
        )
            .into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

/// GET /api/collaborations/pending - invitations awaiting my answer.
pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
) -> axum::response::Response {
    match services.invites.list_pending_for(current.id()).await {
        Ok(invites) => (StatusCode::OK, Json(json!({ "data": invites }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
