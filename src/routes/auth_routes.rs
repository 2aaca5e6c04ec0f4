use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::put,
};

use super::appointment_routes::bad_json;
use crate::{
    auth::verify_password,
    error::ApiError,
    models::{AppState, Envelope, LoginRequest, UserType},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/user", put(login))
}

/// Exchanges username/password for a bearer token carrying user id and type.
pub async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let Json(req) = req.map_err(bad_json)?;

    let username = req.username.as_deref().map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "username is required".into(),
        ));
    }
    let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) else {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "password is required".into(),
        ));
    };

    let person = state
        .store
        .find_credentials(username)
        .await
        .map_err(|e| ApiError::Internal("INTERNAL", e.to_string()))?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(password, &person.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let user_type = UserType::from_code(person.person_type).ok_or_else(|| {
        ApiError::Internal(
            "INTERNAL",
            format!("person {} has unknown type {}", person.person_id, person.person_type),
        )
    })?;

    let token = state
        .tokens
        .issue(person.person_id, user_type)
        .map_err(|e| ApiError::Internal("INTERNAL", e.to_string()))?;

    tracing::debug!(user_id = person.person_id, user_type = user_type.as_str(), "logged in");
    Ok(Json(Envelope::ok(token)))
}
