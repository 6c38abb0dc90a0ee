use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use carelog_core::DomainError;
use carelog_store::StoreError;

use crate::workflow::CollabError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Unavailable(msg) => {
            tracing::error!("store failure: {msg}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "storage unavailable",
            )
        }
    }
}

pub fn collab_error_to_response(err: CollabError) -> axum::response::Response {
    match err {
        CollabError::NotOwner => json_error(StatusCode::FORBIDDEN, "not_owner", err.to_string()),
        CollabError::UnknownInvitee => {
            json_error(StatusCode::NOT_FOUND, "unknown_invitee", err.to_string())
        }
        CollabError::SelfInvite => {
            json_error(StatusCode::BAD_REQUEST, "self_invite", err.to_string())
        }
        CollabError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        CollabError::NotRecipient => {
            json_error(StatusCode::FORBIDDEN, "not_recipient", err.to_string())
        }
        CollabError::AlreadyProcessed => {
            json_error(StatusCode::CONFLICT, "already_processed", err.to_string())
        }
        CollabError::Store(e) => store_error_to_response(e),
    }
}
