use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use carelog_core::{AccountId, DomainError, DomainResult, PatientId, SessionId};

/// Mutable clinical content of a session, as submitted on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub intervention_plan: String,
    pub vitals: Option<Value>,
    pub description: String,
    pub achievements: Option<String>,
    pub patient_performance: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub has_incident: bool,
    pub incident_details: Option<String>,
    pub incident_photo: Option<String>,
    pub next_session_notes: Option<String>,
}

impl SessionDraft {
    /// Incident rule: a flagged session must carry incident details.
    pub fn validate(&self) -> DomainResult<()> {
        if self.intervention_plan.trim().is_empty() {
            return Err(DomainError::validation("intervention plan is required"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description is required"));
        }
        if self.has_incident
            && self
                .incident_details
                .as_deref()
                .is_none_or(|d| d.trim().is_empty())
        {
            return Err(DomainError::validation(
                "incident details are mandatory when an incident is reported",
            ));
        }
        Ok(())
    }
}

/// One recorded clinical session for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub patient_id: PatientId,
    /// Author; the only professional (besides admins) allowed to edit/delete.
    pub professional_id: AccountId,
    pub intervention_plan: String,
    pub vitals: Option<Value>,
    pub description: String,
    pub achievements: Option<String>,
    pub patient_performance: Option<String>,
    pub photos: Vec<String>,
    pub has_incident: bool,
    pub incident_details: Option<String>,
    pub incident_photo: Option<String>,
    pub next_session_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn create(
        patient_id: PatientId,
        professional_id: AccountId,
        draft: SessionDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id: SessionId::new(),
            patient_id,
            professional_id,
            intervention_plan: draft.intervention_plan,
            vitals: draft.vitals,
            description: draft.description,
            achievements: draft.achievements,
            patient_performance: draft.patient_performance,
            photos: draft.photos,
            has_incident: draft.has_incident,
            incident_details: draft.incident_details,
            incident_photo: draft.incident_photo,
            next_session_notes: draft.next_session_notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Re-apply submitted content onto an existing session.
    ///
    /// Vitals and photos keep their stored value when the draft omits them.
    pub fn apply(&mut self, draft: SessionDraft, now: DateTime<Utc>) -> DomainResult<()> {
        draft.validate()?;

        if draft.vitals.is_some() {
            self.vitals = draft.vitals;
        }
        if !draft.photos.is_empty() {
            self.photos = draft.photos;
        }

        self.intervention_plan = draft.intervention_plan;
        self.description = draft.description;
        self.achievements = draft.achievements;
        self.patient_performance = draft.patient_performance;
        self.has_incident = draft.has_incident;
        self.incident_details = draft.incident_details;
        self.incident_photo = draft.incident_photo;
        self.next_session_notes = draft.next_session_notes;
        self.updated_at = now;
        Ok(())
    }
}
