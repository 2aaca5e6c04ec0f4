// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    routing::{get, post},
};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AppointmentSummary, Envelope, UserType},
    scheduling::request::AppointmentPayload,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointment", post(schedule_appointment))
        .route("/appointments/{patient_id}", get(list_patient_appointments))
}

pub(crate) fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest("INVALID_PAYLOAD", rejection.body_text())
}

pub(crate) fn bad_path(rejection: PathRejection) -> ApiError {
    ApiError::BadRequest("INVALID_PATH", rejection.body_text())
}

/* ============================================================
   POST /appointment
   ============================================================ */

pub async fn schedule_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<AppointmentPayload>, JsonRejection>,
) -> Result<Json<Envelope<i64>>, ApiError> {
    let Json(payload) = payload.map_err(bad_json)?;

    let appointment_id = state
        .coordinator
        .schedule_appointment(&auth.caller(), payload)
        .await?;

    Ok(Json(Envelope::ok(appointment_id)))
}

/* ============================================================
   GET /appointments/{patient_id}
   ============================================================ */

pub async fn list_patient_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    patient_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<Vec<AppointmentSummary>>>, ApiError> {
    let Path(patient_id) = patient_id.map_err(bad_path)?;

    // Assistants see everyone; patients only themselves.
    match auth.user_type {
        UserType::Assistant => {}
        UserType::Patient if auth.user_id == patient_id => {}
        UserType::Patient => {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "You can only see your own appointments".into(),
            ));
        }
        _ => {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only patients or assistants can see appointments".into(),
            ));
        }
    }

    let rows = state
        .store
        .appointments_for_patient(patient_id)
        .await
        .map_err(|e| ApiError::Internal("INTERNAL", e.to_string()))?;

    Ok(Json(Envelope::ok(rows)))
}
