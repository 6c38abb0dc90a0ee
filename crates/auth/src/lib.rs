//! `carelog-auth` — bearer-token verification boundary.
//!
//! Two trust paths are supported, selected by the algorithm the token
//! declares: a shared HMAC secret, and a remote JSON Web Key Set for
//! asymmetric signatures. This crate is intentionally decoupled from HTTP
//! routing and storage; it turns a raw token into verified [`Claims`] or an
//! [`AuthError`].

pub mod claims;
pub mod jwks;
pub mod verifier;

pub use claims::Claims;
pub use jwks::JwksCache;
pub use verifier::{AuthError, TokenVerifier};
