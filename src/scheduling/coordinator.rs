// src/scheduling/coordinator.rs

use std::sync::Arc;

use super::{
    ActorKey, Caller, EventKind, NewEvent, NewHospitalization, NurseAssignment, NurseCategory,
    NurseRole, Practice, SchedulingError, Slot,
    ports::{BookingTx, HospitalStore},
    request::{Admission, AppointmentPayload, AppointmentRequest, SurgeryPayload, SurgeryRequest},
};
use crate::models::UserType;

/// Runs one booking per call as a single all-or-nothing transaction.
///
/// Every precondition that needs no store access is checked before the
/// transaction opens. Once it is open, any error rolls it back and is
/// returned unchanged; nothing is retried.
#[derive(Clone)]
pub struct BookingCoordinator {
    store: Arc<dyn HospitalStore>,
}

impl BookingCoordinator {
    pub fn new(store: Arc<dyn HospitalStore>) -> Self {
        Self { store }
    }

    /// Books an appointment for the calling patient. Returns the appointment id.
    pub async fn schedule_appointment(
        &self,
        caller: &Caller,
        payload: AppointmentPayload,
    ) -> Result<i64, SchedulingError> {
        caller.require(UserType::Patient, "schedule appointments")?;
        let req = payload.validate()?;

        tracing::info!(
            patient_id = caller.user_id,
            doctor_id = req.doctor_id,
            date = %req.slot.date,
            "scheduling appointment"
        );

        let mut tx = self.store.begin().await?;
        let outcome = book_appointment(tx.as_mut(), caller, &req).await;
        let id = finish(tx, outcome, EventKind::Appointment).await?;

        tracing::info!(appointment_id = id, "appointment committed");
        Ok(id)
    }

    /// Books a surgery on behalf of the calling assistant, creating its
    /// hospitalization when `hospitalization_id` is absent. Returns the surgery id.
    pub async fn schedule_surgery(
        &self,
        caller: &Caller,
        payload: SurgeryPayload,
        hospitalization_id: Option<i64>,
    ) -> Result<i64, SchedulingError> {
        caller.require(UserType::Assistant, "schedule surgeries")?;
        let req = payload.validate(hospitalization_id)?;

        tracing::info!(
            assistant_id = caller.user_id,
            doctor_id = req.doctor_id,
            patient_id = req.patient_id,
            date = %req.slot.date,
            ?hospitalization_id,
            "scheduling surgery"
        );

        let mut tx = self.store.begin().await?;
        let outcome = book_surgery(tx.as_mut(), caller, &req).await;
        let id = finish(tx, outcome, EventKind::Surgery).await?;

        tracing::info!(surgery_id = id, "surgery committed");
        Ok(id)
    }
}

/// Commits on success, rolls back on any error.
async fn finish(
    tx: Box<dyn BookingTx>,
    outcome: Result<i64, SchedulingError>,
    kind: EventKind,
) -> Result<i64, SchedulingError> {
    match outcome {
        Ok(id) => {
            tx.commit().await?;
            Ok(id)
        }
        Err(err) => {
            tracing::warn!(kind = kind.as_str(), error = %err, "booking rolled back");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn actor_keys(doctor_id: i64, room: i64, nurses: &[NurseRole], extra: &[ActorKey]) -> Vec<ActorKey> {
    let mut keys: Vec<ActorKey> = [ActorKey::Doctor(doctor_id), ActorKey::Room(room)]
        .into_iter()
        .chain(nurses.iter().map(|n| ActorKey::Nurse(n.nurse_id)))
        .chain(extra.iter().copied())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

async fn book_appointment(
    tx: &mut dyn BookingTx,
    caller: &Caller,
    req: &AppointmentRequest,
) -> Result<i64, SchedulingError> {
    let kind = EventKind::Appointment;

    tx.lock_actors(&actor_keys(req.doctor_id, req.room, &req.nurses, &[]))
        .await?;

    if !tx
        .doctor_practises(req.doctor_id, &Practice::Consultation(req.specialty.clone()))
        .await?
    {
        return Err(SchedulingError::DoctorSpecialtyMismatch);
    }

    ensure_slot_free(tx, req.doctor_id, req.room, &req.slot, kind).await?;

    let appointment_id = tx
        .insert_event(&NewEvent {
            kind,
            doctor_id: req.doctor_id,
            patient_id: caller.user_id,
            slot: req.slot,
            room: req.room,
            tag: req.specialty.clone(),
            hospitalization_id: None,
        })
        .await?;
    tracing::debug!(appointment_id, "appointment row inserted");

    for nurse in &req.nurses {
        assign_nurse(tx, nurse, kind, &req.slot, appointment_id, req.doctor_id, caller.user_id)
            .await?;
    }

    Ok(appointment_id)
}

async fn book_surgery(
    tx: &mut dyn BookingTx,
    caller: &Caller,
    req: &SurgeryRequest,
) -> Result<i64, SchedulingError> {
    let kind = EventKind::Surgery;

    let extra: &[ActorKey] = match req.admission {
        Admission::New { .. } => &[ActorKey::HospitalizationRooms],
        Admission::Existing(_) => &[],
    };
    tx.lock_actors(&actor_keys(req.doctor_id, req.room, &req.nurses, extra))
        .await?;

    if !tx
        .doctor_practises(req.doctor_id, &Practice::Surgery(req.sub_specialty.clone()))
        .await?
    {
        return Err(SchedulingError::SurgeonSpecialtyMismatch);
    }

    ensure_slot_free(tx, req.doctor_id, req.room, &req.slot, kind).await?;

    let hospitalization_id = match req.admission {
        Admission::Existing(id) => {
            if !tx.hospitalization_exists(id).await? {
                return Err(SchedulingError::HospitalizationNotFound(id));
            }
            id
        }
        Admission::New {
            responsible_nurse,
            final_date,
        } => {
            if !tx
                .nurse_has_category(responsible_nurse, NurseCategory::Hospitalizations)
                .await?
            {
                return Err(SchedulingError::ResponsibleNurseNotQualified(responsible_nurse));
            }

            let room = tx
                .first_free_hospitalization_room(req.slot.date, final_date)
                .await?
                .ok_or(SchedulingError::NoHospitalizationRoom)?;
            tracing::debug!(room, "hospitalization room allocated");

            let id = tx
                .insert_hospitalization(&NewHospitalization {
                    start_date: req.slot.date,
                    final_date,
                    room,
                    assistant_id: caller.user_id,
                    nurse_id: responsible_nurse,
                })
                .await?;
            tracing::debug!(hospitalization_id = id, "hospitalization created");
            id
        }
    };

    let surgery_id = tx
        .insert_event(&NewEvent {
            kind,
            doctor_id: req.doctor_id,
            patient_id: req.patient_id,
            slot: req.slot,
            room: req.room,
            tag: req.sub_specialty.clone(),
            hospitalization_id: Some(hospitalization_id),
        })
        .await?;
    tracing::debug!(surgery_id, hospitalization_id, "surgery row inserted");

    for nurse in &req.nurses {
        assign_nurse(tx, nurse, kind, &req.slot, surgery_id, req.doctor_id, req.patient_id)
            .await?;
    }

    Ok(surgery_id)
}

async fn ensure_slot_free(
    tx: &mut dyn BookingTx,
    doctor_id: i64,
    room: i64,
    slot: &Slot,
    kind: EventKind,
) -> Result<(), SchedulingError> {
    if !tx.is_doctor_available(doctor_id, slot, kind).await? {
        return Err(SchedulingError::DoctorUnavailable);
    }
    if !tx.is_room_available(room, slot, kind).await? {
        return Err(SchedulingError::RoomUnavailable);
    }
    Ok(())
}

async fn assign_nurse(
    tx: &mut dyn BookingTx,
    nurse: &NurseRole,
    kind: EventKind,
    slot: &Slot,
    event_id: i64,
    doctor_id: i64,
    patient_id: i64,
) -> Result<(), SchedulingError> {
    let category = kind.nurse_category();
    if !tx.nurse_has_category(nurse.nurse_id, category).await? {
        return Err(SchedulingError::NurseNotInCategory {
            nurse_id: nurse.nurse_id,
            category,
        });
    }

    let role_id = tx
        .resolve_role(&nurse.role, kind.role_type())
        .await?
        .ok_or_else(|| SchedulingError::UnknownRole {
            role: nurse.role.clone(),
            kind,
        })?;

    if !tx.is_nurse_available(nurse.nurse_id, slot, kind).await? {
        return Err(SchedulingError::NurseUnavailable(nurse.nurse_id));
    }

    tx.link_nurse_role(nurse.nurse_id, role_id).await?;
    tx.insert_nurse_assignment(&NurseAssignment {
        kind,
        event_id,
        nurse_id: nurse.nurse_id,
        role_id,
        doctor_id,
        patient_id,
    })
    .await?;

    tracing::debug!(nurse_id = nurse.nurse_id, role_id, event_id, "nurse assigned");
    Ok(())
}
