// src/scheduling/ports.rs

//! Store-facing traits used by the booking coordinator.
//!
//! Every method except [`HospitalStore::begin`] runs inside one open
//! transaction, so availability answers and the inserts that depend on them
//! see the same state.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    ActorKey, EventKind, NewEvent, NewHospitalization, NurseAssignment, NurseCategory, Practice,
    RoleType, Slot, StoreResult,
};
use crate::models::{AppointmentSummary, CredentialRow};

/// Answers "is this actor free" against current durable state.
///
/// Free means no booked event of the relevant kind overlaps the window
/// `[slot, slot + kind.duration_minutes())`.
#[async_trait]
pub trait AvailabilityOracle: Send {
    async fn is_doctor_available(
        &mut self,
        doctor_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool>;

    async fn is_room_available(&mut self, room: i64, slot: &Slot, kind: EventKind)
    -> StoreResult<bool>;

    async fn is_nurse_available(
        &mut self,
        nurse_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool>;

    /// First hospitalization room with no stay overlapping `start..=end`.
    async fn first_free_hospitalization_room(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<i64>>;
}

#[async_trait]
pub trait RoleValidator: Send {
    async fn nurse_has_category(
        &mut self,
        nurse_id: i64,
        category: NurseCategory,
    ) -> StoreResult<bool>;

    async fn resolve_role(&mut self, role: &str, role_type: RoleType) -> StoreResult<Option<i64>>;
}

/// One open booking transaction.
#[async_trait]
pub trait BookingTx: AvailabilityOracle + RoleValidator {
    /// Blocks until this transaction exclusively owns every listed actor.
    /// Callers pass the keys sorted so concurrent requests lock in the same order.
    async fn lock_actors(&mut self, actors: &[ActorKey]) -> StoreResult<()>;

    /// True when the doctor exists and practises what the event needs.
    async fn doctor_practises(&mut self, doctor_id: i64, practice: &Practice) -> StoreResult<bool>;

    async fn hospitalization_exists(&mut self, hospitalization_id: i64) -> StoreResult<bool>;

    async fn insert_hospitalization(&mut self, row: &NewHospitalization) -> StoreResult<i64>;

    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<i64>;

    /// Records that the nurse can perform the role. A nurse that already has a
    /// capability link keeps it.
    async fn link_nurse_role(&mut self, nurse_id: i64, role_id: i64) -> StoreResult<()>;

    async fn insert_nurse_assignment(&mut self, assignment: &NurseAssignment) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait HospitalStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>>;

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRow>>;

    async fn appointments_for_patient(&self, patient_id: i64)
    -> StoreResult<Vec<AppointmentSummary>>;
}
