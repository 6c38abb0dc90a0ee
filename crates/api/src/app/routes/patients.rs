//! Patient CRUD and the unified patient profile.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, json};

use carelog_core::PatientId;
use carelog_patients::{Patient, age_on, can_view_patient, patient_team};

use crate::app::{errors, services::AppServices};
use crate::context::CurrentAccount;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/:id", get(patient_profile))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub rut: String,
    /// YYYY-MM-DD
    pub birth_date: String,
    pub email: String,
    pub phone: Option<String>,
    pub diagnosis: Option<String>,
    pub consent_pdf_url: String,
    pub sex: String,
    pub emergency_phone: Option<String>,
}

/// POST /api/patients - register a patient under the current professional.
pub async fn create_patient(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Json(body): Json<CreatePatientRequest>,
) -> axum::response::Response {
    let Ok(birth_date) = NaiveDate::parse_from_str(&body.birth_date, "%Y-%m-%d") else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "birth_date must be YYYY-MM-DD",
        );
    };
    if body.first_name.trim().is_empty()
        || body.last_name.trim().is_empty()
        || body.rut.trim().is_empty()
        || body.consent_pdf_url.trim().is_empty()
    {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "first_name, last_name, rut and consent_pdf_url are required",
        );
    }

    let age = age_on(birth_date, Utc::now().date_naive());
    let mut personal_info = Map::new();
    personal_info.insert("first_name".to_string(), json!(body.first_name));
    personal_info.insert("last_name".to_string(), json!(body.last_name));
    personal_info.insert("rut".to_string(), json!(body.rut));
    personal_info.insert("birth_date".to_string(), json!(body.birth_date));
    personal_info.insert("email".to_string(), json!(body.email));
    personal_info.insert("phone".to_string(), json!(body.phone));
    personal_info.insert("diagnosis".to_string(), json!(body.diagnosis));
    personal_info.insert("sex".to_string(), json!(body.sex));
    personal_info.insert("age".to_string(), json!(age));
    personal_info.insert("emergency_phone".to_string(), json!(body.emergency_phone));

    let patient = Patient::new(
        current.id(),
        personal_info,
        body.consent_pdf_url,
        Utc::now(),
    );

    if let Err(e) = services.patients.insert(&patient).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(json!({ "message": "patient created", "data": patient })),
    )
        .into_response()
}

/// GET /api/patients - patients the account created or collaborates on.
pub async fn list_patients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
) -> axum::response::Response {
    match services.patients.list_accessible(current.id()).await {
        Ok(patients) => (StatusCode::OK, Json(json!({ "data": patients }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /api/patients/:id - unified profile: patient, team, recent sessions,
/// incident count. Team-gated.
pub async fn patient_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let patient_id: PatientId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid patient id");
        }
    };

    let patient = match services.patients.get(patient_id).await {
        Ok(Some(patient)) => patient,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "patient not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    let accepted = match services.invites.accepted_professionals_for(patient_id).await {
        Ok(accepted) => accepted,
        Err(e) => return errors::store_error_to_response(e),
    };

    if !can_view_patient(current.account(), &patient, &accepted) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "you do not have access to this patient",
        );
    }

    let mut team = Vec::new();
    for member in patient_team(&patient, accepted) {
        match services.accounts.get(member).await {
            Ok(Some(account)) => team.push(account),
            Ok(None) => {}
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    let recent_sessions = match services.sessions.recent_for_patient(patient_id, 5).await {
        Ok(sessions) => sessions,
        Err(e) => return errors::store_error_to_response(e),
    };
    let incident_count = match services.sessions.count_incidents(Some(patient_id)).await {
        Ok(count) => count,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "data": {
                "patient": patient,
                "team": team,
                "recent_sessions": recent_sessions,
                "incident_count": incident_count,
            }
        })),
    )
        .into_response()
}
