//! `carelog-notifications` — persisted notification records and the business
//! event kinds that produce them.

pub mod notification;

pub use notification::{EventKind, Notification};
