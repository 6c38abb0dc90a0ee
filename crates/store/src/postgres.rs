//! Postgres-backed store.
//!
//! Tenancy is single-tenant; isolation concerns here are (a) the unique
//! primary key on `accounts.id` absorbing the first-login provisioning race
//! and (b) the conditional update on `collaborations.status` that makes the
//! Pending → terminal transition atomic.
//!
//! SQLx errors map to [`StoreError`]: unique violations (code 23505) become
//! `Conflict`, everything else `Unavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use carelog_collab::{CollaborationInvite, InviteStatus};
use carelog_core::{AccountId, DomainError, InviteId, NotificationId, PatientId, SessionId};
use carelog_identity::{Account, AccountStatus, Role};
use carelog_notifications::Notification;
use carelog_patients::{Patient, Session};

use crate::error::StoreError;
use crate::repo::{
    AccountStore, InviteStore, NotificationStore, PatientStore, SessionFilter, SessionStore,
};

/// Idempotent schema bootstrap, applied at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
  id UUID PRIMARY KEY,
  email TEXT NOT NULL,
  role TEXT NOT NULL,
  status TEXT NOT NULL,
  avatar_url TEXT,
  profile JSONB NOT NULL DEFAULT '{}'::jsonb,
  reject_reason TEXT,
  created_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (
  id UUID PRIMARY KEY,
  creator_id UUID NOT NULL REFERENCES accounts(id),
  personal_info JSONB NOT NULL,
  disability_report TEXT,
  care_notes TEXT,
  consent_pdf_url TEXT NOT NULL,
  created_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
  id UUID PRIMARY KEY,
  patient_id UUID NOT NULL REFERENCES patients(id),
  professional_id UUID NOT NULL REFERENCES accounts(id),
  intervention_plan TEXT NOT NULL,
  vitals JSONB,
  description TEXT NOT NULL,
  achievements TEXT,
  patient_performance TEXT,
  photos TEXT[] NOT NULL DEFAULT '{}',
  has_incident BOOLEAN NOT NULL DEFAULT FALSE,
  incident_details TEXT,
  incident_photo TEXT,
  next_session_notes TEXT,
  created_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS collaborations (
  id UUID PRIMARY KEY,
  patient_id UUID NOT NULL REFERENCES patients(id),
  professional_id UUID NOT NULL REFERENCES accounts(id),
  status TEXT NOT NULL DEFAULT 'PENDING',
  invited_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL,
  UNIQUE (patient_id, professional_id)
);

CREATE TABLE IF NOT EXISTS notifications (
  id UUID PRIMARY KEY,
  recipient_id UUID NOT NULL REFERENCES accounts(id),
  kind TEXT NOT NULL,
  message TEXT NOT NULL,
  related_id UUID,
  is_read BOOLEAN NOT NULL DEFAULT FALSE,
  created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_patient ON sessions (patient_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (recipient_id, created_at DESC);
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the idempotent schema.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::conflict(db.message().to_string())
        }
        _ => StoreError::unavailable(e.to_string()),
    }
}

fn corrupt(e: DomainError) -> StoreError {
    StoreError::unavailable(format!("corrupt row: {e}"))
}

fn json_object(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let role: String = row.try_get("role").map_err(map_sqlx)?;
    let status: String = row.try_get("status").map_err(map_sqlx)?;
    let profile: Value = row.try_get("profile").map_err(map_sqlx)?;

    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        email: row.try_get("email").map_err(map_sqlx)?,
        role: role.parse::<Role>().map_err(corrupt)?,
        status: status.parse::<AccountStatus>().map_err(corrupt)?,
        avatar_url: row.try_get("avatar_url").map_err(map_sqlx)?,
        profile: json_object(profile),
        reject_reason: row.try_get("reject_reason").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn patient_from_row(row: &PgRow) -> Result<Patient, StoreError> {
    let personal_info: Value = row.try_get("personal_info").map_err(map_sqlx)?;

    Ok(Patient {
        id: PatientId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        creator_id: AccountId::from_uuid(row.try_get("creator_id").map_err(map_sqlx)?),
        personal_info: json_object(personal_info),
        disability_report: row.try_get("disability_report").map_err(map_sqlx)?,
        care_notes: row.try_get("care_notes").map_err(map_sqlx)?,
        consent_pdf_url: row.try_get("consent_pdf_url").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    Ok(Session {
        id: SessionId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        patient_id: PatientId::from_uuid(row.try_get("patient_id").map_err(map_sqlx)?),
        professional_id: AccountId::from_uuid(row.try_get("professional_id").map_err(map_sqlx)?),
        intervention_plan: row.try_get("intervention_plan").map_err(map_sqlx)?,
        vitals: row.try_get("vitals").map_err(map_sqlx)?,
        description: row.try_get("description").map_err(map_sqlx)?,
        achievements: row.try_get("achievements").map_err(map_sqlx)?,
        patient_performance: row.try_get("patient_performance").map_err(map_sqlx)?,
        photos: row.try_get("photos").map_err(map_sqlx)?,
        has_incident: row.try_get("has_incident").map_err(map_sqlx)?,
        incident_details: row.try_get("incident_details").map_err(map_sqlx)?,
        incident_photo: row.try_get("incident_photo").map_err(map_sqlx)?,
        next_session_notes: row.try_get("next_session_notes").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn invite_from_row(row: &PgRow) -> Result<CollaborationInvite, StoreError> {
    let status: String = row.try_get("status").map_err(map_sqlx)?;

    Ok(CollaborationInvite {
        id: InviteId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        patient_id: PatientId::from_uuid(row.try_get("patient_id").map_err(map_sqlx)?),
        professional_id: AccountId::from_uuid(row.try_get("professional_id").map_err(map_sqlx)?),
        status: status.parse::<InviteStatus>().map_err(corrupt)?,
        invited_at: row.try_get("invited_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn notification_from_row(row: &PgRow) -> Result<Notification, StoreError> {
    let kind: String = row.try_get("kind").map_err(map_sqlx)?;

    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        recipient_id: AccountId::from_uuid(row.try_get("recipient_id").map_err(map_sqlx)?),
        kind: kind.parse().map_err(corrupt)?,
        message: row.try_get("message").map_err(map_sqlx)?,
        related_id: row.try_get("related_id").map_err(map_sqlx)?,
        is_read: row.try_get("is_read").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        sqlx::query("SELECT * FROM accounts WHERE email = $1 LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts \
             (id, email, role, status, avatar_url, profile, reject_reason, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(account.id.as_uuid())
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(account.status.as_str())
        .bind(&account.avatar_url)
        .bind(Value::Object(account.profile.clone()))
        .bind(&account.reject_reason)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE accounts SET email = $2, role = $3, status = $4, avatar_url = $5, \
             profile = $6, reject_reason = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(account.id.as_uuid())
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(account.status.as_str())
        .bind(&account.avatar_url)
        .bind(Value::Object(account.profile.clone()))
        .bind(&account.reject_reason)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        sqlx::query("SELECT * FROM accounts WHERE role = $1")
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .iter()
            .map(account_from_row)
            .collect()
    }

    async fn list_by_status(&self, status: AccountStatus) -> Result<Vec<Account>, StoreError> {
        sqlx::query("SELECT * FROM accounts WHERE status = $1")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .iter()
            .map(account_from_row)
            .collect()
    }

    async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl PatientStore for PgStore {
    async fn get(&self, id: PatientId) -> Result<Option<Patient>, StoreError> {
        sqlx::query("SELECT * FROM patients WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|row| patient_from_row(&row))
            .transpose()
    }

    async fn insert(&self, patient: &Patient) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO patients \
             (id, creator_id, personal_info, disability_report, care_notes, consent_pdf_url, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(patient.id.as_uuid())
        .bind(patient.creator_id.as_uuid())
        .bind(Value::Object(patient.personal_info.clone()))
        .bind(&patient.disability_report)
        .bind(&patient.care_notes)
        .bind(&patient.consent_pdf_url)
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_accessible(&self, account: AccountId) -> Result<Vec<Patient>, StoreError> {
        sqlx::query(
            "SELECT * FROM patients WHERE creator_id = $1 \
             OR id IN (SELECT patient_id FROM collaborations \
                       WHERE professional_id = $1 AND status = 'ACCEPTED') \
             ORDER BY created_at",
        )
        .bind(account.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .iter()
        .map(patient_from_row)
        .collect()
    }

    async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|row| session_from_row(&row))
            .transpose()
    }

    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions \
             (id, patient_id, professional_id, intervention_plan, vitals, description, \
              achievements, patient_performance, photos, has_incident, incident_details, \
              incident_photo, next_session_notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(session.id.as_uuid())
        .bind(session.patient_id.as_uuid())
        .bind(session.professional_id.as_uuid())
        .bind(&session.intervention_plan)
        .bind(&session.vitals)
        .bind(&session.description)
        .bind(&session.achievements)
        .bind(&session.patient_performance)
        .bind(&session.photos)
        .bind(session.has_incident)
        .bind(&session.incident_details)
        .bind(&session.incident_photo)
        .bind(&session.next_session_notes)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sessions SET intervention_plan = $2, vitals = $3, description = $4, \
             achievements = $5, patient_performance = $6, photos = $7, has_incident = $8, \
             incident_details = $9, incident_photo = $10, next_session_notes = $11, \
             updated_at = $12 WHERE id = $1",
        )
        .bind(session.id.as_uuid())
        .bind(&session.intervention_plan)
        .bind(&session.vitals)
        .bind(&session.description)
        .bind(&session.achievements)
        .bind(&session.patient_performance)
        .bind(&session.photos)
        .bind(session.has_incident)
        .bind(&session.incident_details)
        .bind(&session.incident_photo)
        .bind(&session.next_session_notes)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        sqlx::query(
            "SELECT * FROM sessions \
             WHERE ($1::uuid IS NULL OR patient_id = $1) \
             AND ($2::boolean IS NULL OR has_incident = $2) \
             ORDER BY created_at DESC",
        )
        .bind(filter.patient_id.map(|p| *p.as_uuid()))
        .bind(filter.has_incident)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .iter()
        .map(session_from_row)
        .collect()
    }

    async fn recent_for_patient(
        &self,
        patient: PatientId,
        limit: i64,
    ) -> Result<Vec<Session>, StoreError> {
        sqlx::query(
            "SELECT * FROM sessions WHERE patient_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(patient.as_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .iter()
        .map(session_from_row)
        .collect()
    }

    async fn count_incidents(&self, patient: Option<PatientId>) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sessions WHERE has_incident \
             AND ($1::uuid IS NULL OR patient_id = $1)",
        )
        .bind(patient.map(|p| *p.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}

#[async_trait]
impl InviteStore for PgStore {
    async fn find_or_create(
        &self,
        invite: CollaborationInvite,
    ) -> Result<(CollaborationInvite, bool), StoreError> {
        // The unique (patient_id, professional_id) constraint makes this safe
        // under concurrent invites for the same pair.
        let inserted = sqlx::query(
            "INSERT INTO collaborations \
             (id, patient_id, professional_id, status, invited_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (patient_id, professional_id) DO NOTHING \
             RETURNING *",
        )
        .bind(invite.id.as_uuid())
        .bind(invite.patient_id.as_uuid())
        .bind(invite.professional_id.as_uuid())
        .bind(invite.status.as_str())
        .bind(invite.invited_at)
        .bind(invite.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if let Some(row) = inserted {
            return Ok((invite_from_row(&row)?, true));
        }

        let existing = sqlx::query(
            "SELECT * FROM collaborations WHERE patient_id = $1 AND professional_id = $2",
        )
        .bind(invite.patient_id.as_uuid())
        .bind(invite.professional_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok((invite_from_row(&existing)?, false))
    }

    async fn get(&self, id: InviteId) -> Result<Option<CollaborationInvite>, StoreError> {
        sqlx::query("SELECT * FROM collaborations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|row| invite_from_row(&row))
            .transpose()
    }

    async fn set_status_if_pending(
        &self,
        id: InviteId,
        status: InviteStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<CollaborationInvite>, StoreError> {
        sqlx::query(
            "UPDATE collaborations SET status = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'PENDING' RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .map(|row| invite_from_row(&row))
        .transpose()
    }

    async fn list_pending_for(
        &self,
        professional: AccountId,
    ) -> Result<Vec<CollaborationInvite>, StoreError> {
        sqlx::query(
            "SELECT * FROM collaborations \
             WHERE professional_id = $1 AND status = 'PENDING' ORDER BY invited_at",
        )
        .bind(professional.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .iter()
        .map(invite_from_row)
        .collect()
    }

    async fn accepted_professionals_for(
        &self,
        patient: PatientId,
    ) -> Result<Vec<AccountId>, StoreError> {
        let rows = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT professional_id FROM collaborations \
             WHERE patient_id = $1 AND status = 'ACCEPTED'",
        )
        .bind(patient.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(AccountId::from_uuid).collect())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notifications \
             (id, recipient_id, kind, message, related_id, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.recipient_id.as_uuid())
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.related_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_for(&self, recipient: AccountId) -> Result<Vec<Notification>, StoreError> {
        sqlx::query("SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC")
            .bind(recipient.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .iter()
            .map(notification_from_row)
            .collect()
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        recipient: AccountId,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2")
                .bind(id.as_uuid())
                .bind(recipient.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
