use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carelog_core::{AccountId, DomainError, DomainResult, InviteId, PatientId};

/// Invitation lifecycle: `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "PENDING",
            InviteStatus::Accepted => "ACCEPTED",
            InviteStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteStatus::Pending)
    }
}

impl core::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InviteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InviteStatus::Pending),
            "ACCEPTED" => Ok(InviteStatus::Accepted),
            "REJECTED" => Ok(InviteStatus::Rejected),
            other => Err(DomainError::validation(format!(
                "unknown invite status: {other}"
            ))),
        }
    }
}

/// The invited professional's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteDecision {
    Accepted,
    Rejected,
}

impl InviteDecision {
    pub fn as_status(&self) -> InviteStatus {
        match self {
            InviteDecision::Accepted => InviteStatus::Accepted,
            InviteDecision::Rejected => InviteStatus::Rejected,
        }
    }
}

/// A patient-sharing invitation.
///
/// At most one invite is meaningful per (patient, professional) pair;
/// lookups are find-or-create keyed on that pair. Once terminal, an invite
/// is never reopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationInvite {
    pub id: InviteId,
    pub patient_id: PatientId,
    /// The invited professional.
    pub professional_id: AccountId,
    pub status: InviteStatus,
    pub invited_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationInvite {
    pub fn new(patient_id: PatientId, professional_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            id: InviteId::new(),
            patient_id,
            professional_id,
            status: InviteStatus::Pending,
            invited_at: now,
            updated_at: now,
        }
    }

    /// Check that `responder` may answer this invite at all.
    pub fn ensure_recipient(&self, responder: AccountId) -> DomainResult<()> {
        if self.professional_id != responder {
            return Err(DomainError::forbidden(
                "you are not the recipient of this invitation",
            ));
        }
        Ok(())
    }

    /// Pure transition check: only `Pending` invites accept a decision.
    ///
    /// The store performs the actual compare-and-swap; this validates the
    /// observed state up front so callers fail fast with the right error.
    pub fn ensure_pending(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(
                "this invitation has already been processed",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> CollaborationInvite {
        CollaborationInvite::new(PatientId::new(), AccountId::new(), Utc::now())
    }

    #[test]
    fn new_invites_start_pending() {
        let inv = invite();
        assert_eq!(inv.status, InviteStatus::Pending);
        assert!(!inv.status.is_terminal());
    }

    #[test]
    fn only_the_invited_professional_may_respond() {
        let inv = invite();
        assert!(inv.ensure_recipient(inv.professional_id).is_ok());

        let err = inv.ensure_recipient(AccountId::new()).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn terminal_invites_reject_further_decisions() {
        let mut inv = invite();
        assert!(inv.ensure_pending().is_ok());

        inv.status = InviteDecision::Accepted.as_status();
        let err = inv.ensure_pending().unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        inv.status = InviteStatus::Rejected;
        assert!(inv.ensure_pending().is_err());
    }
}
