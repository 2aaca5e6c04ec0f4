// src/scheduling/mod.rs

//! Appointment and surgery booking.
//!
//! A booking request is validated into a typed request, then executed by the
//! [`coordinator::BookingCoordinator`] inside a single store transaction. The
//! store side is reached only through the traits in [`ports`].

pub mod coordinator;
pub mod ports;
pub mod request;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::models::UserType;

pub use coordinator::BookingCoordinator;

/// Specialty tag meaning "general practice": matches doctors with no specialty record.
pub const GENERAL_PRACTICE: &str = "GERAL";
/// Specialty a doctor must hold to operate.
pub const SURGERY_SPECIALTY: &str = "CIRURGIA";
/// Role name marking the nurse responsible for a new hospitalization.
pub const RESPONSIBLE_ROLE: &str = "RESPONSAVEL";

/// The authenticated caller of a scheduling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub user_type: UserType,
}

impl Caller {
    pub fn require(&self, user_type: UserType, action: &str) -> Result<(), SchedulingError> {
        if self.user_type == user_type {
            Ok(())
        } else {
            Err(SchedulingError::Forbidden(format!(
                "Only {}s can {action}",
                user_type.as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Appointment,
    Surgery,
}

impl EventKind {
    /// Minutes reserved by one event of this kind.
    pub fn duration_minutes(self) -> i32 {
        match self {
            EventKind::Appointment => 30,
            EventKind::Surgery => 120,
        }
    }

    /// Nurse category required to take part in an event of this kind.
    pub fn nurse_category(self) -> NurseCategory {
        match self {
            EventKind::Appointment => NurseCategory::Consultations,
            EventKind::Surgery => NurseCategory::Surgeries,
        }
    }

    pub fn role_type(self) -> RoleType {
        match self {
            EventKind::Appointment => RoleType::Appointment,
            EventKind::Surgery => RoleType::Surgery,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Appointment => "appointment",
            EventKind::Surgery => "surgery",
        }
    }
}

/// Booked = 0, Completed = 1 in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum EventStatus {
    Booked = 0,
    Completed = 1,
}

impl EventStatus {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(EventStatus::Booked),
            1 => Some(EventStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NurseCategory {
    Consultations,
    Surgeries,
    Hospitalizations,
}

impl NurseCategory {
    /// Category name as stored in `nurse_categories.category`.
    pub fn as_str(self) -> &'static str {
        match self {
            NurseCategory::Consultations => "CONSULTAS",
            NurseCategory::Surgeries => "CIRURGIAS",
            NurseCategory::Hospitalizations => "HOSPITALIZACOES",
        }
    }
}

/// Scope of a role definition: 0 = appointment roles, 1 = surgery roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum RoleType {
    Appointment = 0,
    Surgery = 1,
}

impl RoleType {
    pub fn code(self) -> i16 {
        self as i16
    }
}

/// A start date and time. The duration comes from the [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub hour: u8,
    pub minute: u8,
}

impl Slot {
    pub fn start(&self) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN);
        self.date.and_time(time)
    }

    pub fn end(&self, kind: EventKind) -> NaiveDateTime {
        self.start() + TimeDelta::minutes(i64::from(kind.duration_minutes()))
    }
}

/// One `(nurse id, role name)` entry of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NurseRole {
    pub nurse_id: i64,
    pub role: String,
}

/// What a doctor must practise to take an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Practice {
    /// Appointment type: [`GENERAL_PRACTICE`] for doctors without a specialty,
    /// otherwise an exact specialty name.
    Consultation(String),
    /// Sub-specialty under [`SURGERY_SPECIALTY`].
    Surgery(String),
}

/// A resource the transaction must lock before checking availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorKey {
    Doctor(i64),
    Room(i64),
    Nurse(i64),
    HospitalizationRooms,
}

impl ActorKey {
    pub fn lock_name(&self) -> String {
        match self {
            ActorKey::Doctor(id) => format!("doctor:{id}"),
            ActorKey::Room(id) => format!("room:{id}"),
            ActorKey::Nurse(id) => format!("nurse:{id}"),
            ActorKey::HospitalizationRooms => "hospitalization-rooms".to_string(),
        }
    }
}

/// Event row to insert. Status is always booked and duration follows the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub slot: Slot,
    pub room: i64,
    pub tag: String,
    pub hospitalization_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHospitalization {
    pub start_date: NaiveDate,
    pub final_date: NaiveDate,
    pub room: i64,
    pub assistant_id: i64,
    pub nurse_id: i64,
}

/// Link between one nurse and one event, under a resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NurseAssignment {
    pub kind: EventKind,
    pub event_id: i64,
    pub nurse_id: i64,
    pub role_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the transaction because of a concurrent booking.
    #[error("booking conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Broad classes of failure, used to pick the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Domain,
    Store,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} value not in payload")]
    MissingField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
    #[error("nurses values is empty")]
    EmptyNurseList,
    #[error("nurse {0} is listed more than once")]
    DuplicateNurse(i64),
    #[error("nurses must have a responsible nurse")]
    MissingResponsibleNurse,

    #[error("Doctor does not exist or the type of appointment does not correspond to the doctor specialisation")]
    DoctorSpecialtyMismatch,
    #[error("Doctor does not exist or the type of surgery does not correspond to the doctor specialisation")]
    SurgeonSpecialtyMismatch,
    #[error("Doctor is already booked at this time")]
    DoctorUnavailable,
    #[error("Room is already booked at this time")]
    RoomUnavailable,
    #[error("Nurse {0} is not available at this time")]
    NurseUnavailable(i64),
    #[error("Nurse {nurse_id} is not a {} nurse", .category.as_str())]
    NurseNotInCategory { nurse_id: i64, category: NurseCategory },
    #[error("Role {role} does not exist or is not valid for {}", .kind.as_str())]
    UnknownRole { role: String, kind: EventKind },
    #[error("Responsible nurse {0} is not a valid hospitalization nurse")]
    ResponsibleNurseNotQualified(i64),
    #[error("No rooms available for hospitalization")]
    NoHospitalizationRoom,
    #[error("Hospitalization {0} does not exist")]
    HospitalizationNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchedulingError {
    pub fn category(&self) -> ErrorCategory {
        use SchedulingError::*;
        match self {
            Forbidden(_)
            | MissingField(_)
            | InvalidField { .. }
            | InvalidDate(_)
            | EmptyNurseList
            | DuplicateNurse(_)
            | MissingResponsibleNurse => ErrorCategory::Request,
            Store(_) => ErrorCategory::Store,
            _ => ErrorCategory::Domain,
        }
    }

    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        use SchedulingError::*;
        match self {
            Forbidden(_) => "FORBIDDEN",
            MissingField(_) | InvalidField { .. } | DuplicateNurse(_) => "VALIDATION_ERROR",
            InvalidDate(_) => "INVALID_DATE",
            EmptyNurseList => "EMPTY_NURSE_LIST",
            MissingResponsibleNurse => "MISSING_RESPONSIBLE_NURSE",
            DoctorSpecialtyMismatch | SurgeonSpecialtyMismatch => "DOCTOR_SPECIALTY_MISMATCH",
            DoctorUnavailable => "DOCTOR_UNAVAILABLE",
            RoomUnavailable => "ROOM_UNAVAILABLE",
            NurseUnavailable(_) => "NURSE_UNAVAILABLE",
            NurseNotInCategory { .. } => "NURSE_CATEGORY_MISMATCH",
            UnknownRole { .. } => "UNKNOWN_ROLE",
            ResponsibleNurseNotQualified(_) => "RESPONSIBLE_NURSE_INVALID",
            NoHospitalizationRoom => "NO_HOSPITALIZATION_ROOM",
            HospitalizationNotFound(_) => "HOSPITALIZATION_NOT_FOUND",
            Store(StoreError::Conflict(_)) => "CONFLICT",
            Store(StoreError::Database(_)) => "INTERNAL",
        }
    }
}
