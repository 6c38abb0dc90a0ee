//! `carelog-identity` — local account model and status-gating policy.
//!
//! This crate is intentionally decoupled from HTTP, token verification and
//! storage: it owns the `Account` entity, its admin-review lifecycle and the
//! pure gating rules evaluated on every authenticated request.

pub mod account;
pub mod gate;

pub use account::{Account, AccountStatus, Role};
pub use gate::{AccessDenial, gate_request};
