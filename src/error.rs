use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::Envelope;
use crate::scheduling::{ErrorCategory, SchedulingError};

/// Every failure an endpoint can report. Client-side problems render as
/// `status: 400`, server-side ones as `status: 500`; the HTTP status matches.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    Internal(&'static str, String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Invalid username or password".into())
    }

    pub fn missing_token() -> Self {
        ApiError::Unauthorized("UNAUTHORIZED", "Authorization header is required".into())
    }

    pub fn invalid_token() -> Self {
        ApiError::Unauthorized("UNAUTHORIZED", "Invalid or expired token".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) | ApiError::Forbidden(..) | ApiError::BadRequest(..) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn parts(&self) -> (&'static str, &str) {
        match self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::Internal(code, msg) => (*code, msg.as_str()),
        }
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        let code = err.code();
        let msg = err.to_string();
        match (&err, err.category()) {
            (SchedulingError::Forbidden(_), _) => ApiError::Forbidden(code, msg),
            (_, ErrorCategory::Request | ErrorCategory::Domain) => ApiError::BadRequest(code, msg),
            (_, ErrorCategory::Store) => ApiError::Internal(code, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        let (code, msg) = self.parts();
        let body: Envelope<()> = Envelope {
            status: status.as_u16(),
            results: None,
            errors: Some(msg.to_string()),
            code: Some(code),
        };
        (status, Json(body)).into_response()
    }
}
