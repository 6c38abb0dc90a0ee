//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/dispatcher/workflow wiring
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Router, routing::get};

use carelog_auth::{JwksCache, TokenVerifier};

use crate::config::Config;
use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: Config) -> Router {
    let jwks = match &config.jwks_url {
        Some(url) => match JwksCache::new(url.clone()) {
            Ok(cache) => {
                let cache = Arc::new(cache);
                cache.prime().await;
                Some(cache)
            }
            Err(e) => {
                tracing::warn!("failed to build key-set client: {e}");
                None
            }
        },
        None => None,
    };
    let verifier = Arc::new(TokenVerifier::new(config.jwt_secret.clone(), jwks));

    let services = Arc::new(services::build_services(&config).await);
    app_router(services, verifier)
}

/// Assemble the router from pre-built services (shared with the test
/// harness, which seeds the stores before serving).
pub fn app_router(services: Arc<services::AppServices>, verifier: Arc<TokenVerifier>) -> Router {
    let auth_state = middleware::AuthState {
        verifier,
        provisioner: services.provisioner.clone(),
    };

    // Protected routes: token verification + provisioning + status gate.
    let api = routes::router()
        .layer(axum::Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
}
