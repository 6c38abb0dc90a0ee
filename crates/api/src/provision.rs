//! Just-in-time identity provisioning.
//!
//! Resolves verified claims to a local account, creating one on first sight.
//! The Go-to place for the first-login race: a concurrent insert for the
//! same never-seen subject loses with a primary-key conflict and re-reads
//! instead of failing the request.

use std::sync::Arc;

use chrono::Utc;

use carelog_auth::Claims;
use carelog_identity::Account;
use carelog_store::{AccountStore, StoreError};

use crate::dispatch::NotificationDispatcher;

#[derive(Clone)]
pub struct IdentityProvisioner {
    accounts: Arc<dyn AccountStore>,
    dispatcher: NotificationDispatcher,
}

impl IdentityProvisioner {
    pub fn new(accounts: Arc<dyn AccountStore>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            accounts,
            dispatcher,
        }
    }

    /// Look up the account for a verified subject, synthesizing it on first
    /// sight.
    ///
    /// The `NewUser` event fires exactly once per created account: only the
    /// request whose insert actually lands emits it.
    pub async fn resolve_account(&self, claims: &Claims) -> Result<Account, StoreError> {
        if let Some(account) = self.accounts.get(claims.subject).await? {
            return Ok(account);
        }

        let account = Account::provision(
            claims.subject,
            claims.email.clone(),
            claims.metadata.clone(),
            Utc::now(),
        );

        match self.accounts.insert(&account).await {
            Ok(()) => {
                tracing::info!(email = %account.email, "new account auto-provisioned");
                self.dispatcher.new_user(&account).await;
                Ok(account)
            }
            Err(StoreError::Conflict(_)) => {
                // Lost the first-login race; the winner created the row.
                self.accounts
                    .get(claims.subject)
                    .await?
                    .ok_or_else(|| StoreError::unavailable("account missing after insert conflict"))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NotificationDispatcher;
    use crate::mailer::mock::MockMailer;
    use carelog_core::AccountId;
    use carelog_identity::{AccountStatus, Role};
    use carelog_store::{MemoryStore, NotificationStore};
    use serde_json::{Map, json};
    use std::time::Duration;

    fn provisioner_over(store: Arc<MemoryStore>) -> IdentityProvisioner {
        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MockMailer::new()),
        );
        IdentityProvisioner::new(store, dispatcher)
    }

    fn claims_for(subject: AccountId) -> Claims {
        let mut metadata = Map::new();
        metadata.insert("picture".to_string(), json!("https://cdn/p.png"));
        metadata.insert("full_name".to_string(), json!("New Pro"));
        Claims {
            subject,
            email: "new@clinic.test".to_string(),
            metadata,
        }
    }

    async fn seed_admin(store: &MemoryStore) -> Account {
        let mut admin = Account::provision(
            AccountId::new(),
            "admin@clinic.test".to_string(),
            Map::new(),
            Utc::now(),
        );
        admin.role = Role::Admin;
        admin.approve(Utc::now());
        AccountStore::insert(store, &admin).await.unwrap();
        admin
    }

    #[tokio::test]
    async fn first_sight_creates_an_inactive_professional() {
        let store = Arc::new(MemoryStore::new());
        let admin = seed_admin(&store).await;
        let provisioner = provisioner_over(store.clone());

        let subject = AccountId::new();
        let account = provisioner
            .resolve_account(&claims_for(subject))
            .await
            .unwrap();

        assert_eq!(account.id, subject);
        assert_eq!(account.role, Role::Professional);
        assert_eq!(account.status, AccountStatus::Inactive);
        assert_eq!(account.avatar_url.as_deref(), Some("https://cdn/p.png"));

        // The admin is told about the newcomer (background task).
        for _ in 0..100 {
            if !store.list_for(admin.id).await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let notified = store.list_for(admin.id).await.unwrap();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].related_id, Some(*subject.as_uuid()));
    }

    #[tokio::test]
    async fn second_sight_reuses_the_stored_account() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = provisioner_over(store.clone());

        let subject = AccountId::new();
        let first = provisioner
            .resolve_account(&claims_for(subject))
            .await
            .unwrap();
        let second = provisioner
            .resolve_account(&claims_for(subject))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(AccountStore::count(store.as_ref()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_logins_create_exactly_one_account() {
        let store = Arc::new(MemoryStore::new());
        let admin = seed_admin(&store).await;
        let provisioner = provisioner_over(store.clone());

        let subject = AccountId::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let provisioner = provisioner.clone();
            let claims = claims_for(subject);
            handles.push(tokio::spawn(async move {
                provisioner.resolve_account(&claims).await
            }));
        }

        for handle in handles {
            let account = handle.await.unwrap().unwrap();
            assert_eq!(account.id, subject);
        }

        // One admin account + one provisioned account, regardless of N.
        assert_eq!(AccountStore::count(store.as_ref()).await.unwrap(), 2);

        // And the NewUser event fired exactly once.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.list_for(admin.id).await.unwrap().len(), 1);
    }
}
