use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::TokenKeys;
use crate::scheduling::{BookingCoordinator, EventStatus, ports::HospitalStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HospitalStore>,
    pub coordinator: BookingCoordinator,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn HospitalStore>, tokens: TokenKeys) -> Self {
        Self {
            coordinator: BookingCoordinator::new(store.clone()),
            store,
            tokens: Arc::new(tokens),
        }
    }
}

/* -------------------------
   User types
--------------------------*/

/// Person type as stored in `persons.person_type` and carried in tokens:
/// 1 patient, 2 doctor, 3 nurse, 4 assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum UserType {
    Patient = 1,
    Doctor = 2,
    Nurse = 3,
    Assistant = 4,
}

impl UserType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(UserType::Patient),
            2 => Some(UserType::Doctor),
            3 => Some(UserType::Nurse),
            4 => Some(UserType::Assistant),
            _ => None,
        }
    }

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Patient => "patient",
            UserType::Doctor => "doctor",
            UserType::Nurse => "nurse",
            UserType::Assistant => "assistant",
        }
    }
}

/* -------------------------
   API DTOs
--------------------------*/

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub results: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> Envelope<T> {
    pub fn ok(results: T) -> Self {
        Self {
            status: 200,
            results: Some(results),
            errors: None,
            code: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// One row of a patient's appointment list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentSummary {
    pub appointment_id: i64,
    pub doctor_id: i64,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub hour: i32,
    pub minutes: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub room: i64,
    pub status: EventStatus,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub person_id: i64,
    pub person_type: i16,
    pub password_hash: String,
}
