// src/scheduling/request.rs

//! Request payloads and their one-pass validation.
//!
//! Payloads deserialize with every field optional so that a missing field is
//! reported by name, in a fixed order, instead of as a generic JSON error.
//! Numeric fields accept either JSON numbers or numeric strings (`"15"`).

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;

use super::{NurseRole, RESPONSIBLE_ROLE, SchedulingError, Slot};

/// A number that may arrive quoted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IntField {
    Int(i64),
    Text(String),
}

impl IntField {
    fn parse(&self, field: &'static str) -> Result<i64, SchedulingError> {
        match self {
            IntField::Int(v) => Ok(*v),
            IntField::Text(s) => s.trim().parse::<i64>().map_err(|_| SchedulingError::InvalidField {
                field,
                reason: format!("'{s}' is not an integer"),
            }),
        }
    }
}

impl From<i64> for IntField {
    fn from(v: i64) -> Self {
        IntField::Int(v)
    }
}

impl From<&str> for IntField {
    fn from(v: &str) -> Self {
        IntField::Text(v.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPayload {
    pub doctor_id: Option<IntField>,
    pub date: Option<String>,
    pub hour: Option<IntField>,
    pub minutes: Option<IntField>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub room: Option<IntField>,
    pub nurses: Option<Vec<(IntField, String)>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurgeryPayload {
    pub patient_id: Option<IntField>,
    pub doctor_id: Option<IntField>,
    pub nurses: Option<Vec<(IntField, String)>>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub room: Option<IntField>,
    pub hour: Option<IntField>,
    pub minutes: Option<IntField>,
    pub final_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRequest {
    pub doctor_id: i64,
    pub slot: Slot,
    pub specialty: String,
    pub room: i64,
    pub nurses: Vec<NurseRole>,
}

/// Where the surgery's hospitalization comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Existing(i64),
    New {
        responsible_nurse: i64,
        final_date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurgeryRequest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub slot: Slot,
    pub sub_specialty: String,
    pub room: i64,
    /// Nurses to assign to the surgery. The responsible nurse is never in here.
    pub nurses: Vec<NurseRole>,
    pub admission: Admission,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, SchedulingError> {
    value.ok_or(SchedulingError::MissingField(field))
}

/// Parses a `YYYY-MM-DD` date that must exist on the calendar.
///
/// Month and day ranges are checked before the calendar lookup, so
/// `2024-13-01` and `2024-02-30` are both rejected, for different reasons.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, SchedulingError> {
    let invalid = || SchedulingError::InvalidDate(raw.to_string());

    let mut parts = raw.trim().splitn(3, '-');
    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;

    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn parse_slot(
    date: &str,
    hour: &IntField,
    minutes: &IntField,
) -> Result<Slot, SchedulingError> {
    let date = parse_calendar_date(date)?;
    let hour = hour.parse("hour")?;
    let minute = minutes.parse("minutes")?;

    let hour = u8::try_from(hour)
        .ok()
        .filter(|h| *h <= 23)
        .ok_or_else(|| SchedulingError::InvalidField {
            field: "hour",
            reason: format!("{hour} is outside 0-23"),
        })?;
    let minute = u8::try_from(minute)
        .ok()
        .filter(|m| *m <= 59)
        .ok_or_else(|| SchedulingError::InvalidField {
            field: "minutes",
            reason: format!("{minute} is outside 0-59"),
        })?;

    Ok(Slot { date, hour, minute })
}

fn parse_nurses(raw: Vec<(IntField, String)>) -> Result<Vec<NurseRole>, SchedulingError> {
    let mut seen = HashSet::new();
    let mut nurses = Vec::with_capacity(raw.len());
    for (id, role) in raw {
        let nurse_id = id.parse("nurses")?;
        if !seen.insert(nurse_id) {
            return Err(SchedulingError::DuplicateNurse(nurse_id));
        }
        nurses.push(NurseRole {
            nurse_id,
            role: role.trim().to_string(),
        });
    }
    Ok(nurses)
}

fn non_blank(value: String, field: &'static str) -> Result<String, SchedulingError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(SchedulingError::InvalidField {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(value)
}

impl AppointmentPayload {
    pub fn validate(self) -> Result<AppointmentRequest, SchedulingError> {
        let doctor_id = required(self.doctor_id, "doctor_id")?;
        let date = required(self.date, "date")?;
        let hour = required(self.hour, "hour")?;
        let minutes = required(self.minutes, "minutes")?;
        let kind = required(self.kind, "type")?;
        let room = required(self.room, "room")?;
        let nurses = required(self.nurses, "nurses")?;

        let slot = parse_slot(&date, &hour, &minutes)?;
        if nurses.is_empty() {
            return Err(SchedulingError::EmptyNurseList);
        }

        Ok(AppointmentRequest {
            doctor_id: doctor_id.parse("doctor_id")?,
            slot,
            specialty: non_blank(kind, "type")?,
            room: room.parse("room")?,
            nurses: parse_nurses(nurses)?,
        })
    }
}

impl SurgeryPayload {
    /// Validates a surgery request. With `hospitalization_id` absent a
    /// responsible nurse and a `final_date` are required; with it present,
    /// both are ignored.
    pub fn validate(
        self,
        hospitalization_id: Option<i64>,
    ) -> Result<SurgeryRequest, SchedulingError> {
        let patient_id = required(self.patient_id, "patient_id")?;
        let doctor_id = required(self.doctor_id, "doctor_id")?;
        let nurses = required(self.nurses, "nurses")?;
        let date = required(self.date, "date")?;
        let kind = required(self.kind, "type")?;
        let room = required(self.room, "room")?;
        let hour = required(self.hour, "hour")?;
        let minutes = required(self.minutes, "minutes")?;

        if nurses.is_empty() {
            return Err(SchedulingError::EmptyNurseList);
        }
        let mut nurses = parse_nurses(nurses)?;

        let responsible = nurses
            .iter()
            .position(|n| n.role == RESPONSIBLE_ROLE)
            .map(|idx| nurses.remove(idx).nurse_id);

        let admission = match hospitalization_id {
            Some(id) => Admission::Existing(id),
            None => {
                let responsible_nurse =
                    responsible.ok_or(SchedulingError::MissingResponsibleNurse)?;
                let final_date = required(self.final_date, "final_date")?;
                Admission::New {
                    responsible_nurse,
                    final_date: parse_calendar_date(&final_date)?,
                }
            }
        };

        let slot = parse_slot(&date, &hour, &minutes)?;
        if let Admission::New { final_date, .. } = &admission {
            if *final_date < slot.date {
                return Err(SchedulingError::InvalidField {
                    field: "final_date",
                    reason: "must not be earlier than date".into(),
                });
            }
        }

        Ok(SurgeryRequest {
            patient_id: patient_id.parse("patient_id")?,
            doctor_id: doctor_id.parse("doctor_id")?,
            slot,
            sub_specialty: non_blank(kind, "type")?,
            room: room.parse("room")?,
            nurses,
            admission,
        })
    }
}
