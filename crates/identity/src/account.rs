use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use carelog_core::{AccountId, DomainError, DomainResult};

/// Role granted to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Professional,
    Business,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Professional => "PROFESSIONAL",
            Role::Business => "BUSINESS",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "PROFESSIONAL" => Ok(Role::Professional),
            "BUSINESS" => Ok(Role::Business),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Account review lifecycle.
///
/// Accounts are born `Inactive` and move to a terminal-ish `Active` or
/// `Rejected` only through explicit admin review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Inactive,
    Active,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Rejected => "REJECTED",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INACTIVE" => Ok(AccountStatus::Inactive),
            "ACTIVE" => Ok(AccountStatus::Active),
            "REJECTED" => Ok(AccountStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown status: {other}"))),
        }
    }
}

/// Local account record.
///
/// The id is immutable and equals the external identity's subject id; there
/// is no separate mapping table. Accounts are created once (on first
/// successful token verification of an unseen subject) and never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub avatar_url: Option<String>,
    /// Free-form provider/profile attributes (full name, specialty, ...).
    pub profile: Map<String, Value>,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata keys probed for an avatar reference, in order.
const AVATAR_KEYS: [&str; 2] = ["avatar_url", "picture"];

impl Account {
    /// Synthesize a fresh account from verified token claims.
    ///
    /// Defaults: role `Professional`, status `Inactive` (awaiting admin
    /// review). The avatar is pulled defensively from known metadata keys;
    /// the rest of the metadata becomes the initial profile document.
    pub fn provision(
        id: AccountId,
        email: String,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        let avatar_url = AVATAR_KEYS
            .iter()
            .find_map(|k| metadata.get(*k).and_then(Value::as_str))
            .map(str::to_owned);

        Self {
            id,
            email,
            role: Role::Professional,
            status: AccountStatus::Inactive,
            avatar_url,
            profile: metadata,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin review: approve the account.
    ///
    /// Clears any previous reject reason.
    pub fn approve(&mut self, now: DateTime<Utc>) {
        self.status = AccountStatus::Active;
        self.reject_reason = None;
        self.updated_at = now;
    }

    /// Admin review: reject the account with a mandatory reason.
    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        if reason.trim().is_empty() {
            return Err(DomainError::validation("reject reason is required"));
        }
        self.status = AccountStatus::Rejected;
        self.reject_reason = Some(reason.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Self-service profile merge: patch entries overwrite or extend the
    /// profile document; nothing else on the account changes.
    pub fn merge_profile(&mut self, patch: Map<String, Value>, now: DateTime<Utc>) {
        for (key, value) in patch {
            self.profile.insert(key, value);
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn provision_defaults_to_inactive_professional() {
        let account = Account::provision(
            AccountId::new(),
            "pro@clinic.test".to_string(),
            Map::new(),
            Utc::now(),
        );

        assert_eq!(account.role, Role::Professional);
        assert_eq!(account.status, AccountStatus::Inactive);
        assert!(account.avatar_url.is_none());
        assert!(account.reject_reason.is_none());
    }

    #[test]
    fn provision_extracts_avatar_from_known_keys() {
        let a = Account::provision(
            AccountId::new(),
            "a@x.test".to_string(),
            meta(&[("avatar_url", json!("https://cdn/a.png"))]),
            Utc::now(),
        );
        assert_eq!(a.avatar_url.as_deref(), Some("https://cdn/a.png"));

        let b = Account::provision(
            AccountId::new(),
            "b@x.test".to_string(),
            meta(&[("picture", json!("https://cdn/b.png"))]),
            Utc::now(),
        );
        assert_eq!(b.avatar_url.as_deref(), Some("https://cdn/b.png"));

        // Non-string values are ignored rather than trusted.
        let c = Account::provision(
            AccountId::new(),
            "c@x.test".to_string(),
            meta(&[("avatar_url", json!(42))]),
            Utc::now(),
        );
        assert!(c.avatar_url.is_none());
    }

    #[test]
    fn approve_clears_previous_reject_reason() {
        let mut account = Account::provision(
            AccountId::new(),
            "pro@clinic.test".to_string(),
            Map::new(),
            Utc::now(),
        );
        account.reject("incomplete registry", Utc::now()).unwrap();
        assert_eq!(account.status, AccountStatus::Rejected);

        account.approve(Utc::now());
        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.reject_reason.is_none());
    }

    #[test]
    fn reject_requires_a_reason() {
        let mut account = Account::provision(
            AccountId::new(),
            "pro@clinic.test".to_string(),
            Map::new(),
            Utc::now(),
        );

        let err = account.reject("   ", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(account.status, AccountStatus::Inactive);
    }

    #[test]
    fn merge_profile_overwrites_and_extends() {
        let mut account = Account::provision(
            AccountId::new(),
            "pro@clinic.test".to_string(),
            meta(&[("full_name", json!("Old Name")), ("provider", json!("oidc"))]),
            Utc::now(),
        );

        account.merge_profile(
            meta(&[("full_name", json!("New Name")), ("specialty", json!("PT"))]),
            Utc::now(),
        );

        assert_eq!(account.profile["full_name"], json!("New Name"));
        assert_eq!(account.profile["specialty"], json!("PT"));
        assert_eq!(account.profile["provider"], json!("oidc"));
    }
}
