use std::sync::Arc;

use sqlx::PgPool;

use carelog_store::{
    AccountStore, InviteStore, MemoryStore, NotificationStore, PatientStore, PgStore, SessionStore,
};

use crate::config::Config;
use crate::dispatch::NotificationDispatcher;
use crate::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::provision::IdentityProvisioner;
use crate::workflow::CollaborationWorkflow;

/// Store handles plus the services composed over them.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<dyn AccountStore>,
    pub patients: Arc<dyn PatientStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub invites: Arc<dyn InviteStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub dispatcher: NotificationDispatcher,
    pub provisioner: IdentityProvisioner,
    pub collab: CollaborationWorkflow,
}

impl AppServices {
    pub fn assemble(
        accounts: Arc<dyn AccountStore>,
        patients: Arc<dyn PatientStore>,
        sessions: Arc<dyn SessionStore>,
        invites: Arc<dyn InviteStore>,
        notifications: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(
            accounts.clone(),
            patients.clone(),
            invites.clone(),
            notifications.clone(),
            mailer,
        );
        let provisioner = IdentityProvisioner::new(accounts.clone(), dispatcher.clone());
        let collab = CollaborationWorkflow::new(
            patients.clone(),
            accounts.clone(),
            invites.clone(),
            dispatcher.clone(),
        );

        Self {
            accounts,
            patients,
            sessions,
            invites,
            notifications,
            dispatcher,
            provisioner,
            collab,
        }
    }

    /// In-memory wiring for tests/dev.
    pub fn in_memory(mailer: Arc<dyn Mailer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::assemble(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            mailer,
        )
    }
}

pub async fn build_services(config: &Config) -> AppServices {
    let mailer: Arc<dyn Mailer> = if config.smtp.email.is_empty() {
        tracing::warn!("SMTP_EMAIL not set; notification emails will be logged only");
        Arc::new(LogMailer)
    } else {
        match SmtpMailer::new(&config.smtp) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::error!("failed to build SMTP transport, falling back to logging: {e}");
                Arc::new(LogMailer)
            }
        }
    };

    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .unwrap_or_else(|e| panic!("failed to connect to Postgres: {e}"));
            let store = PgStore::new(pool);
            store
                .migrate()
                .await
                .unwrap_or_else(|e| panic!("failed to apply schema: {e}"));

            let store = Arc::new(store);
            AppServices::assemble(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                store,
                mailer,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            AppServices::in_memory(mailer)
        }
    }
}
