use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use carelog_core::{AccountId, PatientId};

/// Patient record.
///
/// Personal data (name, rut, contact, diagnosis, ...) lives in a free-form
/// JSON document; the columns the backend reasons about stay typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub creator_id: AccountId,
    pub personal_info: Map<String, Value>,
    pub disability_report: Option<String>,
    pub care_notes: Option<String>,
    pub consent_pdf_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(
        creator_id: AccountId,
        personal_info: Map<String, Value>,
        consent_pdf_url: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PatientId::new(),
            creator_id,
            personal_info,
            disability_report: None,
            care_notes: None,
            consent_pdf_url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Whole years between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if today.ordinal() < birth_date.ordinal() {
        age -= 1;
    }
    age
}
