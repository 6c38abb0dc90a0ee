use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carelog_core::{AccountId, DomainError, NotificationId};

/// The five business events that produce notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NewUser,
    AccountStatus,
    IncidentAlert,
    CollabInvite,
    InviteResponse,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewUser => "NEW_USER",
            EventKind::AccountStatus => "ACCOUNT_STATUS",
            EventKind::IncidentAlert => "INCIDENT_ALERT",
            EventKind::CollabInvite => "COLLAB_INVITE",
            EventKind::InviteResponse => "INVITE_RESPONSE",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_USER" => Ok(EventKind::NewUser),
            "ACCOUNT_STATUS" => Ok(EventKind::AccountStatus),
            "INCIDENT_ALERT" => Ok(EventKind::IncidentAlert),
            "COLLAB_INVITE" => Ok(EventKind::CollabInvite),
            "INVITE_RESPONSE" => Ok(EventKind::InviteResponse),
            other => Err(DomainError::validation(format!(
                "unknown event kind: {other}"
            ))),
        }
    }
}

/// A persisted in-app notification.
///
/// Immutable after creation except for the read flag, which the recipient
/// toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: AccountId,
    pub kind: EventKind,
    pub message: String,
    /// Entity the notification points at (patient, account, ...), if any.
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: AccountId,
        kind: EventKind,
        message: String,
        related_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id,
            kind,
            message,
            related_id,
            is_read: false,
            created_at: now,
        }
    }
}
