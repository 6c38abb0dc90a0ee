use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

use carelog_core::AccountId;

use crate::claims::{Claims, EMAIL_SENTINEL, RawClaims};
use crate::jwks::JwksCache;

/// Verification failure.
///
/// Callers surface every variant as the same generic unauthorized response;
/// the distinction exists for logs only (no oracle leakage to clients).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("verifier configuration error: {0}")]
    Config(String),
}

/// JOSE header, parsed leniently so an unknown `alg` can be named in logs
/// instead of collapsing into a generic parse failure.
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    kid: Option<String>,
}

const HMAC_ALGS: [&str; 3] = ["HS256", "HS384", "HS512"];
const ASYMMETRIC_ALGS: [&str; 9] = [
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "EdDSA",
];

/// Dual-path bearer-token verifier.
///
/// The trust path is selected by the algorithm the token declares, never
/// assumed: HMAC-family tokens verify against the configured shared secret,
/// asymmetric tokens resolve their key from the remote key set by key id.
pub struct TokenVerifier {
    hmac_secret: Option<Vec<u8>>,
    jwks: Option<Arc<JwksCache>>,
}

impl TokenVerifier {
    pub fn new(hmac_secret: Option<String>, jwks: Option<Arc<JwksCache>>) -> Self {
        Self {
            hmac_secret: hmac_secret
                .filter(|s| !s.is_empty())
                .map(String::into_bytes),
            jwks,
        }
    }

    /// Verify a raw bearer token and extract identity claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = parse_header(token)?;
        let (algorithm, key) = self.resolve_key(&header).await?;

        let mut validation = Validation::new(algorithm);
        // Tokens from the identity provider carry an audience we do not
        // partition on; issuer trust comes from the key material itself.
        validation.validate_aud = false;

        let data = decode::<RawClaims>(token, &key, &validation).map_err(map_decode_error)?;
        claims_from_raw(data.claims)
    }

    async fn resolve_key(&self, header: &RawHeader) -> Result<(Algorithm, DecodingKey), AuthError> {
        let alg = header.alg.as_str();

        if HMAC_ALGS.contains(&alg) {
            let secret = self.hmac_secret.as_deref().ok_or_else(|| {
                AuthError::Config("HMAC token received but no shared secret is configured".into())
            })?;
            return Ok((parse_algorithm(alg)?, DecodingKey::from_secret(secret)));
        }

        if ASYMMETRIC_ALGS.contains(&alg) {
            let jwks = self.jwks.as_ref().ok_or_else(|| {
                AuthError::Config(
                    "asymmetric token received but no key-set endpoint is configured".into(),
                )
            })?;
            let kid = header
                .kid
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("token header missing 'kid'".into()))?;
            let key = jwks.key_for(kid).await.ok_or_else(|| {
                tracing::warn!(%kid, "no verification key found for key id");
                AuthError::SignatureInvalid
            })?;
            return Ok((parse_algorithm(alg)?, key));
        }

        Err(AuthError::UnsupportedAlgorithm(header.alg.clone()))
    }
}

fn parse_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    alg.parse::<Algorithm>()
        .map_err(|_| AuthError::UnsupportedAlgorithm(alg.to_string()))
}

fn parse_header(token: &str) -> Result<RawHeader, AuthError> {
    let mut parts = token.splitn(3, '.');
    let (Some(header), Some(_payload), Some(_signature)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed(
            "expected three dot-separated segments".into(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::Malformed(format!("header is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Malformed(format!("header is not valid JSON: {e}")))
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::ImmatureSignature => {
            AuthError::SignatureInvalid
        }
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Malformed(e.to_string()),
    }
}

fn claims_from_raw(raw: RawClaims) -> Result<Claims, AuthError> {
    let sub = raw
        .sub
        .ok_or_else(|| AuthError::Malformed("token missing 'sub' claim".into()))?;
    let subject = sub
        .parse::<AccountId>()
        .map_err(|_| AuthError::Malformed("'sub' claim is not a valid UUID".into()))?;

    Ok(Claims {
        subject,
        email: raw.email.unwrap_or_else(|| EMAIL_SENTINEL.to_string()),
        metadata: raw.user_metadata.unwrap_or_default(),
    })
}
