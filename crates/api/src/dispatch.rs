//! Event-triggered notification dispatch.
//!
//! `notify_*` methods resolve the recipient set on the caller's context,
//! then hand each recipient to a detached background unit of work that
//! persists the notification and independently attempts an email. No
//! ordering across recipients, no delivery retry; failures are logged and
//! swallowed so they can never reach the triggering request.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use carelog_collab::InviteStatus;
use carelog_core::{AccountId, PatientId};
use carelog_identity::{Account, AccountStatus, Role};
use carelog_notifications::{EventKind, Notification};
use carelog_patients::patient_team;
use carelog_store::{AccountStore, InviteStore, NotificationStore, PatientStore};

use crate::mailer::Mailer;

#[derive(Clone)]
pub struct NotificationDispatcher {
    accounts: Arc<dyn AccountStore>,
    patients: Arc<dyn PatientStore>,
    invites: Arc<dyn InviteStore>,
    notifications: Arc<dyn NotificationStore>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        patients: Arc<dyn PatientStore>,
        invites: Arc<dyn InviteStore>,
        notifications: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            accounts,
            patients,
            invites,
            notifications,
            mailer,
        }
    }

    /// First-time account creation: every admin gets notified.
    pub async fn new_user(&self, new_account: &Account) {
        let admins = match self.accounts.list_by_role(Role::Admin).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::error!("failed to resolve admin recipients: {e}");
                return;
            }
        };

        let subject = "New user registered";
        let body = format!(
            "{} has registered and is awaiting verification. Please review the account in the admin panel.",
            new_account.email
        );

        for admin in admins {
            self.deliver(
                admin.id,
                EventKind::NewUser,
                subject,
                &body,
                Some(*new_account.id.as_uuid()),
            );
        }
    }

    /// Admin review outcome, sent to the reviewed account.
    pub async fn account_status(&self, account: &Account) {
        let subject = "Account status update";
        let mut body = format!("Your account has been: {}.", account.status);
        match (account.status, &account.reject_reason) {
            (AccountStatus::Rejected, Some(reason)) => {
                body.push_str(&format!("\n\nRejection reason: {reason}"));
            }
            _ => {
                body.push_str("\n\nYou can now access the platform and manage your patients.");
            }
        }

        self.deliver(account.id, EventKind::AccountStatus, subject, &body, None);
    }

    /// Incident on a session: the patient's full team is alerted.
    pub async fn incident_alert(&self, patient_id: PatientId, details: &str) {
        let patient = match self.patients.get(patient_id).await {
            Ok(Some(patient)) => patient,
            Ok(None) => {
                tracing::error!(%patient_id, "incident alert for unknown patient");
                return;
            }
            Err(e) => {
                tracing::error!(%patient_id, "failed to load patient for incident alert: {e}");
                return;
            }
        };

        let accepted = match self.invites.accepted_professionals_for(patient_id).await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(%patient_id, "failed to resolve collaborators for incident alert: {e}");
                Vec::new()
            }
        };

        let subject = format!("Incident alert: patient {patient_id}");
        let body = format!(
            "An incident has been reported for patient {patient_id}.\n\nDetails: {details}\n\nPlease review the care log for evidence and follow-up.",
        );

        for member in patient_team(&patient, accepted) {
            self.deliver(
                member,
                EventKind::IncidentAlert,
                &subject,
                &body,
                Some(*patient_id.as_uuid()),
            );
        }
    }

    /// Fresh collaboration invite, sent to the invited professional.
    pub async fn collab_invite(&self, invitee: AccountId, patient: PatientId) {
        self.deliver(
            invitee,
            EventKind::CollabInvite,
            "Collaboration invitation",
            "You have been invited to collaborate on a patient's clinical record. Open the app to accept or decline.",
            Some(*patient.as_uuid()),
        );
    }

    /// Terminal invite transition, sent to the patient's creator.
    pub async fn invite_response(
        &self,
        creator: AccountId,
        responder_email: &str,
        status: InviteStatus,
    ) {
        let subject = format!("Invitation {status}");
        let body = format!("{responder_email} has responded to your invitation: {status}.");

        self.deliver(creator, EventKind::InviteResponse, &subject, &body, None);
    }

    /// Persist + email for one recipient as a detached background task.
    ///
    /// The two steps fail independently: a failed insert does not cancel
    /// the email attempt, and neither failure propagates anywhere but logs.
    fn deliver(
        &self,
        recipient: AccountId,
        kind: EventKind,
        subject: &str,
        body: &str,
        related_id: Option<Uuid>,
    ) {
        let notification = Notification::new(
            recipient,
            kind,
            format!("{subject}: {body}"),
            related_id,
            Utc::now(),
        );
        let accounts = self.accounts.clone();
        let notifications = self.notifications.clone();
        let mailer = self.mailer.clone();
        let subject = subject.to_string();
        let body = body.to_string();

        tokio::spawn(async move {
            if let Err(e) = notifications.insert(&notification).await {
                tracing::error!(%recipient, %kind, "failed to persist notification: {e}");
            }

            let email = match accounts.get(recipient).await {
                Ok(Some(account)) => account.email,
                Ok(None) => {
                    tracing::error!(%recipient, "notification recipient has no account");
                    return;
                }
                Err(e) => {
                    tracing::error!(%recipient, "failed to load recipient email: {e}");
                    return;
                }
            };

            match mailer.send(&email, &subject, &body).await {
                Ok(()) => tracing::info!(to = %email, %subject, "notification email sent"),
                Err(e) => tracing::error!(to = %email, "failed to send notification email: {e}"),
            }
        });
    }
}
