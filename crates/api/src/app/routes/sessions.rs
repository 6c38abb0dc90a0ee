//! Clinical session CRUD.
//!
//! Recording or updating a session with the incident flag set fans an
//! `IncidentAlert` out to the patient's team.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use carelog_core::{PatientId, SessionId};
use carelog_patients::{Session, SessionDraft, can_modify_session};

use crate::app::{errors, services::AppServices};
use crate::context::CurrentAccount;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route(
            "/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub patient_id: String,
    #[serde(flatten)]
    pub draft: SessionDraft,
}

/// POST /api/sessions - record a session for a patient.
pub async fn create_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Json(body): Json<CreateSessionRequest>,
) -> axum::response::Response {
    let patient_id: PatientId = match body.patient_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid patient id");
        }
    };

    let session = match Session::create(patient_id, current.id(), body.draft, Utc::now()) {
        Ok(session) => session,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.sessions.insert(&session).await {
        return errors::store_error_to_response(e);
    }

    if session.has_incident {
        let details = session.incident_details.clone().unwrap_or_default();
        services.dispatcher.incident_alert(patient_id, &details).await;
        tracing::warn!(
            patient_id = %patient_id,
            professional = %current.account().email,
            "incident reported, team notified"
        );
    }

    (
        StatusCode::CREATED,
        Json(json!({ "message": "session recorded", "data": session })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub patient_id: Option<String>,
    pub has_incident: Option<bool>,
}

/// GET /api/sessions?patient_id=&has_incident= - list sessions, newest first.
pub async fn list_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SessionListQuery>,
) -> axum::response::Response {
    let patient_id = match query.patient_id.as_deref().map(str::parse::<PatientId>) {
        Some(Ok(id)) => Some(id),
        Some(Err(_)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid patient id");
        }
        None => None,
    };

    let filter = carelog_store::SessionFilter {
        patient_id,
        has_incident: query.has_incident,
    };
    match services.sessions.list(filter).await {
        Ok(sessions) => (StatusCode::OK, Json(json!({ "data": sessions }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /api/sessions/:id
pub async fn get_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let session_id: SessionId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid session id");
        }
    };

    match services.sessions.get(session_id).await {
        Ok(Some(session)) => (StatusCode::OK, Json(json!({ "data": session }))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "session not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT /api/sessions/:id - author-or-admin edit.
pub async fn update_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<String>,
    Json(draft): Json<SessionDraft>,
) -> axum::response::Response {
    let session_id: SessionId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid session id");
        }
    };

    let mut session = match services.sessions.get(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "session not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    if !can_modify_session(current.account(), &session) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "you can only edit your own sessions",
        );
    }

    if let Err(e) = session.apply(draft, Utc::now()) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.sessions.update(&session).await {
        return errors::store_error_to_response(e);
    }

    if session.has_incident {
        let details = session.incident_details.clone().unwrap_or_default();
        services
            .dispatcher
            .incident_alert(session.patient_id, &details)
            .await;
    }

    (
        StatusCode::OK,
        Json(json!({ "message": "session updated", "data": session })),
    )
        .into_response()
}

/// DELETE /api/sessions/:id - author-or-admin delete.
pub async fn delete_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let session_id: SessionId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid session id");
        }
    };

    let session = match services.sessions.get(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "session not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    if !can_modify_session(current.account(), &session) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "you can only delete your own sessions",
        );
    }

    match services.sessions.delete(session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "session deleted" })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
