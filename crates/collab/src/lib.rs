//! `carelog-collab` — patient-sharing invitations between professionals.

pub mod invite;

pub use invite::{CollaborationInvite, InviteDecision, InviteStatus};
