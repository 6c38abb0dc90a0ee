//! Repository contracts over the relational store.
//!
//! Handlers and services depend on these traits only; the concrete store
//! (in-memory or Postgres) is injected at wiring time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use carelog_collab::{CollaborationInvite, InviteStatus};
use carelog_core::{AccountId, InviteId, NotificationId, PatientId, SessionId};
use carelog_identity::{Account, AccountStatus, Role};
use carelog_notifications::Notification;
use carelog_patients::{Patient, Session};

use crate::error::StoreError;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a brand-new account.
    ///
    /// Returns `Conflict` when the id is already taken; callers provisioning
    /// on first login treat that as "created concurrently, re-fetch".
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    async fn update(&self, account: &Account) -> Result<(), StoreError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError>;

    async fn list_by_status(&self, status: AccountStatus) -> Result<Vec<Account>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn get(&self, id: PatientId) -> Result<Option<Patient>, StoreError>;

    async fn insert(&self, patient: &Patient) -> Result<(), StoreError>;

    /// Patients the account may act on: created by it, or shared with it
    /// through an accepted collaboration.
    async fn list_accessible(&self, account: AccountId) -> Result<Vec<Patient>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

/// Listing filter for clinical sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFilter {
    pub patient_id: Option<PatientId>,
    pub has_incident: Option<bool>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    async fn insert(&self, session: &Session) -> Result<(), StoreError>;

    async fn update(&self, session: &Session) -> Result<(), StoreError>;

    /// Returns `NotFound` when the session does not exist.
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;

    /// Newest first.
    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError>;

    /// The `limit` most recent sessions for a patient, newest first.
    async fn recent_for_patient(
        &self,
        patient: PatientId,
        limit: i64,
    ) -> Result<Vec<Session>, StoreError>;

    /// Incident-flagged session count; `None` counts across all patients.
    async fn count_incidents(&self, patient: Option<PatientId>) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Find-or-create keyed on (patient, professional).
    ///
    /// Returns the stored invite and whether this call created it. A repeat
    /// invite for the same pair returns the existing row untouched.
    async fn find_or_create(
        &self,
        invite: CollaborationInvite,
    ) -> Result<(CollaborationInvite, bool), StoreError>;

    async fn get(&self, id: InviteId) -> Result<Option<CollaborationInvite>, StoreError>;

    /// Atomic Pending → terminal transition (single conditional update).
    ///
    /// Returns the updated invite, or `None` when the invite was no longer
    /// Pending — the loser of a concurrent double-submit lands here.
    async fn set_status_if_pending(
        &self,
        id: InviteId,
        status: InviteStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<CollaborationInvite>, StoreError>;

    async fn list_pending_for(
        &self,
        professional: AccountId,
    ) -> Result<Vec<CollaborationInvite>, StoreError>;

    /// Account ids of professionals with an accepted invite for the patient.
    async fn accepted_professionals_for(
        &self,
        patient: PatientId,
    ) -> Result<Vec<AccountId>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_for(&self, recipient: AccountId) -> Result<Vec<Notification>, StoreError>;

    /// Set the read flag; returns `false` when no such notification belongs
    /// to `recipient`.
    async fn mark_read(
        &self,
        id: NotificationId,
        recipient: AccountId,
    ) -> Result<bool, StoreError>;
}
