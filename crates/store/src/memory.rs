//! In-memory store for tests/dev.
//!
//! One struct backs all five repositories so cross-entity queries (patient
//! access, accepted collaborators) can be answered without a database.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use carelog_collab::{CollaborationInvite, InviteStatus};
use carelog_core::{AccountId, InviteId, NotificationId, PatientId, SessionId};
use carelog_identity::{Account, AccountStatus, Role};
use carelog_notifications::Notification;
use carelog_patients::{Patient, Session};

use crate::error::StoreError;
use crate::repo::{
    AccountStore, InviteStore, NotificationStore, PatientStore, SessionFilter, SessionStore,
};

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    patients: RwLock<HashMap<PatientId, Patient>>,
    sessions: RwLock<HashMap<SessionId, Session>>,
    invites: RwLock<HashMap<InviteId, CollaborationInvite>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::unavailable("poisoned lock"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::unavailable("poisoned lock"))
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(read(&self.accounts)?.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(read(&self.accounts)?
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = write(&self.accounts)?;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::conflict("account id already exists"));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = write(&self.accounts)?;
        match accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        Ok(read(&self.accounts)?
            .values()
            .filter(|a| a.role == role)
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: AccountStatus) -> Result<Vec<Account>, StoreError> {
        Ok(read(&self.accounts)?
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(read(&self.accounts)?.len() as i64)
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn get(&self, id: PatientId) -> Result<Option<Patient>, StoreError> {
        Ok(read(&self.patients)?.get(&id).cloned())
    }

    async fn insert(&self, patient: &Patient) -> Result<(), StoreError> {
        let mut patients = write(&self.patients)?;
        if patients.contains_key(&patient.id) {
            return Err(StoreError::conflict("patient id already exists"));
        }
        patients.insert(patient.id, patient.clone());
        Ok(())
    }

    async fn list_accessible(&self, account: AccountId) -> Result<Vec<Patient>, StoreError> {
        let shared: Vec<PatientId> = read(&self.invites)?
            .values()
            .filter(|i| i.professional_id == account && i.status == InviteStatus::Accepted)
            .map(|i| i.patient_id)
            .collect();

        let mut out: Vec<Patient> = read(&self.patients)?
            .values()
            .filter(|p| p.creator_id == account || shared.contains(&p.id))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.created_at);
        Ok(out)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(read(&self.patients)?.len() as i64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(read(&self.sessions)?.get(&id).cloned())
    }

    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = write(&self.sessions)?;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::conflict("session id already exists"));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = write(&self.sessions)?;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        match write(&self.sessions)?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        let mut out: Vec<Session> = read(&self.sessions)?
            .values()
            .filter(|s| filter.patient_id.is_none_or(|p| s.patient_id == p))
            .filter(|s| filter.has_incident.is_none_or(|f| s.has_incident == f))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn recent_for_patient(
        &self,
        patient: PatientId,
        limit: i64,
    ) -> Result<Vec<Session>, StoreError> {
        let mut out = self
            .list(SessionFilter {
                patient_id: Some(patient),
                has_incident: None,
            })
            .await?;
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn count_incidents(&self, patient: Option<PatientId>) -> Result<i64, StoreError> {
        Ok(read(&self.sessions)?
            .values()
            .filter(|s| s.has_incident)
            .filter(|s| patient.is_none_or(|p| s.patient_id == p))
            .count() as i64)
    }
}

#[async_trait]
impl InviteStore for MemoryStore {
    async fn find_or_create(
        &self,
        invite: CollaborationInvite,
    ) -> Result<(CollaborationInvite, bool), StoreError> {
        let mut invites = write(&self.invites)?;
        if let Some(existing) = invites
            .values()
            .find(|i| i.patient_id == invite.patient_id && i.professional_id == invite.professional_id)
        {
            return Ok((existing.clone(), false));
        }
        invites.insert(invite.id, invite.clone());
        Ok((invite, true))
    }

    async fn get(&self, id: InviteId) -> Result<Option<CollaborationInvite>, StoreError> {
        Ok(read(&self.invites)?.get(&id).cloned())
    }

    async fn set_status_if_pending(
        &self,
        id: InviteId,
        status: InviteStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<CollaborationInvite>, StoreError> {
        let mut invites = write(&self.invites)?;
        match invites.get_mut(&id) {
            Some(invite) if invite.status == InviteStatus::Pending => {
                invite.status = status;
                invite.updated_at = now;
                Ok(Some(invite.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_pending_for(
        &self,
        professional: AccountId,
    ) -> Result<Vec<CollaborationInvite>, StoreError> {
        let mut out: Vec<CollaborationInvite> = read(&self.invites)?
            .values()
            .filter(|i| i.professional_id == professional && i.status == InviteStatus::Pending)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.invited_at);
        Ok(out)
    }

    async fn accepted_professionals_for(
        &self,
        patient: PatientId,
    ) -> Result<Vec<AccountId>, StoreError> {
        Ok(read(&self.invites)?
            .values()
            .filter(|i| i.patient_id == patient && i.status == InviteStatus::Accepted)
            .map(|i| i.professional_id)
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut notifications = write(&self.notifications)?;
        if notifications.contains_key(&notification.id) {
            return Err(StoreError::conflict("notification id already exists"));
        }
        notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_for(&self, recipient: AccountId) -> Result<Vec<Notification>, StoreError> {
        let mut out: Vec<Notification> = read(&self.notifications)?
            .values()
            .filter(|n| n.recipient_id == recipient)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        recipient: AccountId,
    ) -> Result<bool, StoreError> {
        let mut notifications = write(&self.notifications)?;
        match notifications.get_mut(&id) {
            Some(n) if n.recipient_id == recipient => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Arc;

    fn account(email: &str) -> Account {
        Account::provision(AccountId::new(), email.to_string(), Map::new(), Utc::now())
    }

    #[tokio::test]
    async fn duplicate_account_insert_is_a_conflict() {
        let store = MemoryStore::new();
        let a = account("a@clinic.test");

        AccountStore::insert(&store, &a).await.unwrap();
        let err = AccountStore::insert(&store, &a).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(AccountStore::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_per_pair() {
        let store = MemoryStore::new();
        let patient = PatientId::new();
        let professional = AccountId::new();

        let (first, created) = store
            .find_or_create(CollaborationInvite::new(patient, professional, Utc::now()))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .find_or_create(CollaborationInvite::new(patient, professional, Utc::now()))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn conditional_status_update_fires_exactly_once() {
        let store = MemoryStore::new();
        let (invite, _) = store
            .find_or_create(CollaborationInvite::new(
                PatientId::new(),
                AccountId::new(),
                Utc::now(),
            ))
            .await
            .unwrap();

        let won = store
            .set_status_if_pending(invite.id, InviteStatus::Accepted, Utc::now())
            .await
            .unwrap();
        assert_eq!(won.map(|i| i.status), Some(InviteStatus::Accepted));

        let lost = store
            .set_status_if_pending(invite.id, InviteStatus::Rejected, Utc::now())
            .await
            .unwrap();
        assert!(lost.is_none());

        let stored = InviteStore::get(&store, invite.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InviteStatus::Accepted);
    }

    #[tokio::test]
    async fn concurrent_responses_yield_one_terminal_transition() {
        let store = Arc::new(MemoryStore::new());
        let (invite, _) = store
            .find_or_create(CollaborationInvite::new(
                PatientId::new(),
                AccountId::new(),
                Utc::now(),
            ))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for status in [InviteStatus::Accepted, InviteStatus::Rejected] {
            let store = store.clone();
            let id = invite.id;
            handles.push(tokio::spawn(async move {
                store.set_status_if_pending(id, status, Utc::now()).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let stored = InviteStore::get(store.as_ref(), invite.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.status.is_terminal());
    }

    #[tokio::test]
    async fn accessible_patients_cover_created_and_shared() {
        let store = MemoryStore::new();
        let creator = AccountId::new();
        let collaborator = AccountId::new();

        let mine = Patient::new(creator, Map::new(), "c1.pdf".to_string(), Utc::now());
        let theirs = Patient::new(collaborator, Map::new(), "c2.pdf".to_string(), Utc::now());
        PatientStore::insert(&store, &mine).await.unwrap();
        PatientStore::insert(&store, &theirs).await.unwrap();

        // Share `theirs` with `creator` through an accepted invite.
        let (invite, _) = store
            .find_or_create(CollaborationInvite::new(theirs.id, creator, Utc::now()))
            .await
            .unwrap();
        store
            .set_status_if_pending(invite.id, InviteStatus::Accepted, Utc::now())
            .await
            .unwrap();

        let accessible = store.list_accessible(creator).await.unwrap();
        let ids: Vec<PatientId> = accessible.iter().map(|p| p.id).collect();
        assert!(ids.contains(&mine.id));
        assert!(ids.contains(&theirs.id));

        // A pending invite grants nothing.
        store
            .find_or_create(CollaborationInvite::new(mine.id, collaborator, Utc::now()))
            .await
            .unwrap();
        let pending_only = store.list_accessible(collaborator).await.unwrap();
        assert_eq!(pending_only.len(), 1);
        assert_eq!(pending_only[0].id, theirs.id);
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_the_recipient() {
        let store = MemoryStore::new();
        let recipient = account("r@clinic.test");
        let other = account("o@clinic.test");

        let n = Notification::new(
            recipient.id,
            carelog_notifications::EventKind::NewUser,
            "hello".to_string(),
            None,
            Utc::now(),
        );
        NotificationStore::insert(&store, &n).await.unwrap();

        assert!(!store.mark_read(n.id, other.id).await.unwrap());
        assert!(store.mark_read(n.id, recipient.id).await.unwrap());

        let listed = store.list_for(recipient.id).await.unwrap();
        assert!(listed[0].is_read);
    }
}
