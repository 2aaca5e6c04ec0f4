// src/routes/surgery_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    routing::post,
};

use super::appointment_routes::{bad_json, bad_path};
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Envelope},
    scheduling::request::SurgeryPayload,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/surgery", post(schedule_surgery))
        .route("/surgery/{hospitalization_id}", post(schedule_surgery_in_hospitalization))
}

async fn run(
    state: &AppState,
    auth: &AuthContext,
    payload: Result<Json<SurgeryPayload>, JsonRejection>,
    hospitalization_id: Option<i64>,
) -> Result<Json<Envelope<i64>>, ApiError> {
    let Json(payload) = payload.map_err(bad_json)?;

    let surgery_id = state
        .coordinator
        .schedule_surgery(&auth.caller(), payload, hospitalization_id)
        .await?;

    Ok(Json(Envelope::ok(surgery_id)))
}

/* ============================================================
   POST /surgery (creates the hospitalization)
   ============================================================ */

pub async fn schedule_surgery(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<SurgeryPayload>, JsonRejection>,
) -> Result<Json<Envelope<i64>>, ApiError> {
    run(&state, &auth, payload, None).await
}

/* ============================================================
   POST /surgery/{hospitalization_id}
   ============================================================ */

pub async fn schedule_surgery_in_hospitalization(
    State(state): State<AppState>,
    auth: AuthContext,
    hospitalization_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SurgeryPayload>, JsonRejection>,
) -> Result<Json<Envelope<i64>>, ApiError> {
    let Path(hospitalization_id) = hospitalization_id.map_err(bad_path)?;
    run(&state, &auth, payload, Some(hospitalization_id)).await
}
