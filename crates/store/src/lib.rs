//! `carelog-store` — persistence boundary.
//!
//! Repository traits over the five stored entities, an in-memory
//! implementation for tests/dev, and a Postgres implementation for
//! deployments.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repo;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repo::{
    AccountStore, InviteStore, NotificationStore, PatientStore, SessionFilter, SessionStore,
};
