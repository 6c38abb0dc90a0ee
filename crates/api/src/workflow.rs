//! Collaboration invitation workflow.
//!
//! `invite` is find-or-create on the (patient, professional) pair; `respond`
//! delegates the Pending → terminal transition to the store's conditional
//! update so concurrent double-submits resolve to exactly one winner.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use carelog_collab::{CollaborationInvite, InviteDecision};
use carelog_core::{InviteId, PatientId};
use carelog_identity::Account;
use carelog_store::{AccountStore, InviteStore, PatientStore, StoreError};

use crate::dispatch::NotificationDispatcher;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("patient not found or you are not the creator")]
    NotOwner,

    #[error("no account matches that email")]
    UnknownInvitee,

    #[error("you cannot invite yourself")]
    SelfInvite,

    #[error("invitation not found")]
    NotFound,

    #[error("you are not the recipient of this invitation")]
    NotRecipient,

    #[error("this invitation has already been processed")]
    AlreadyProcessed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct CollaborationWorkflow {
    patients: Arc<dyn PatientStore>,
    accounts: Arc<dyn AccountStore>,
    invites: Arc<dyn InviteStore>,
    dispatcher: NotificationDispatcher,
}

impl CollaborationWorkflow {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        accounts: Arc<dyn AccountStore>,
        invites: Arc<dyn InviteStore>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            patients,
            accounts,
            invites,
            dispatcher,
        }
    }

    /// Invite a professional (by email) to collaborate on a patient.
    ///
    /// Idempotent per (patient, professional): a repeat invite returns the
    /// existing record, and only a fresh creation emits `CollabInvite`.
    pub async fn invite(
        &self,
        patient_id: PatientId,
        inviter: &Account,
        invitee_email: &str,
    ) -> Result<CollaborationInvite, CollabError> {
        let patient = self
            .patients
            .get(patient_id)
            .await?
            .ok_or(CollabError::NotOwner)?;
        if patient.creator_id != inviter.id {
            return Err(CollabError::NotOwner);
        }

        let invitee = self
            .accounts
            .find_by_email(invitee_email)
            .await?
            .ok_or(CollabError::UnknownInvitee)?;
        if invitee.id == inviter.id {
            return Err(CollabError::SelfInvite);
        }

        let (invite, created) = self
            .invites
            .find_or_create(CollaborationInvite::new(patient_id, invitee.id, Utc::now()))
            .await?;

        if created {
            self.dispatcher.collab_invite(invitee.id, patient.id).await;
        }

        Ok(invite)
    }

    /// Answer a pending invitation.
    ///
    /// Exactly one of any number of concurrent responses lands; the rest
    /// observe `AlreadyProcessed`.
    pub async fn respond(
        &self,
        invite_id: InviteId,
        responder: &Account,
        decision: InviteDecision,
    ) -> Result<CollaborationInvite, CollabError> {
        let invite = self
            .invites
            .get(invite_id)
            .await?
            .ok_or(CollabError::NotFound)?;

        invite
            .ensure_recipient(responder.id)
            .map_err(|_| CollabError::NotRecipient)?;
        invite
            .ensure_pending()
            .map_err(|_| CollabError::AlreadyProcessed)?;

        let updated = self
            .invites
            .set_status_if_pending(invite_id, decision.as_status(), Utc::now())
            .await?
            .ok_or(CollabError::AlreadyProcessed)?;

        if let Some(patient) = self.patients.get(updated.patient_id).await? {
            self.dispatcher
                .invite_response(patient.creator_id, &responder.email, updated.status)
                .await;
        }

        Ok(updated)
    }
}
