use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use carelog_auth::TokenVerifier;
use carelog_identity::{AccessDenial, gate_request};

use crate::app::errors;
use crate::context::CurrentAccount;
use crate::provision::IdentityProvisioner;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
    pub provisioner: IdentityProvisioner,
}

/// Verification → provisioning → status gate, on every `/api` request.
///
/// All token failures collapse into one generic 401 body; the specific
/// failure is logged only.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token"))?;

    let claims = state.verifier.verify(token).await.map_err(|e| {
        tracing::warn!("token verification failed: {e}");
        errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token")
    })?;

    // Provisioning races are absorbed inside the provisioner; any surviving
    // store error is an infrastructure failure, fatal to this request only.
    let account = state.provisioner.resolve_account(&claims).await.map_err(|e| {
        tracing::error!("account resolution failed: {e}");
        errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "account resolution failed",
        )
    })?;

    let is_profile_update =
        req.method() == &Method::PUT && req.uri().path().starts_with("/api/auth/profile");
    gate_request(&account, is_profile_update).map_err(|denial| match denial {
        AccessDenial::Rejected { reason } => errors::json_error(
            StatusCode::FORBIDDEN,
            "account_rejected",
            reason.unwrap_or_else(|| "account rejected".to_string()),
        ),
        AccessDenial::PendingApproval => errors::json_error(
            StatusCode::FORBIDDEN,
            "pending_approval",
            "account pending approval",
        ),
    })?;

    req.extensions_mut().insert(CurrentAccount::new(account));

    Ok(next.run(req).await)
}

/// Admin-only guard, layered inside the auth middleware on `/api/admin`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    let is_admin = req
        .extensions()
        .get::<CurrentAccount>()
        .is_some_and(|current| current.account().is_admin());

    if !is_admin {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "admin privileges required",
        ));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
