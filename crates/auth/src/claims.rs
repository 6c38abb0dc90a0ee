use serde::Deserialize;
use serde_json::{Map, Value};

use carelog_core::AccountId;

/// Placeholder when the identity provider did not assert an email.
pub const EMAIL_SENTINEL: &str = "no-email@provided";

/// Verified identity claims extracted from a bearer token.
///
/// Ephemeral: exists only for the duration of one verification.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Stable external subject id; becomes the local account id.
    pub subject: AccountId,
    pub email: String,
    /// Provider-specific profile fields; shape is never trusted.
    pub metadata: Map<String, Value>,
}

/// Wire shape of the token payload. Everything beyond `sub` is optional.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Map<String, Value>>,
}
