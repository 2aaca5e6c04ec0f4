// src/store/memory.rs

//! In-process store for tests.
//!
//! A transaction takes the whole state behind an owned mutex guard and works
//! on a copy, so transactions are fully serialized and a rollback is just
//! dropping the copy.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::auth::hash_password;
use crate::models::{AppointmentSummary, CredentialRow, UserType};
use crate::scheduling::{
    ActorKey, EventKind, EventStatus, GENERAL_PRACTICE, NewEvent, NewHospitalization,
    NurseAssignment, NurseCategory, Practice, RoleType, SURGERY_SPECIALTY, Slot, StoreError,
    StoreResult,
    ports::{AvailabilityOracle, BookingTx, HospitalStore, RoleValidator},
};

#[derive(Debug, Clone)]
pub struct Person {
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone)]
pub struct RoleDef {
    pub id: i64,
    pub name: String,
    pub role_type: RoleType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    pub kind: EventKind,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub slot: Slot,
    pub room: i64,
    pub tag: String,
    pub status: EventStatus,
    pub duration: i32,
    pub hospitalization_id: Option<i64>,
}

impl EventRecord {
    fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.slot.start(), self.slot.end(self.kind))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HospitalizationRecord {
    pub id: i64,
    pub start_date: NaiveDate,
    pub final_date: NaiveDate,
    pub room: i64,
    pub assistant_id: i64,
    pub nurse_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub persons: BTreeMap<i64, Person>,
    pub specialties: HashMap<i64, Vec<String>>,
    pub sub_specialties: HashMap<i64, Vec<String>>,
    pub nurse_categories: HashMap<i64, HashSet<NurseCategory>>,
    pub roles: Vec<RoleDef>,
    pub hospitalization_rooms: Vec<i64>,
    pub hospitalizations: Vec<HospitalizationRecord>,
    pub events: Vec<EventRecord>,
    pub nurse_roles: HashMap<i64, i64>,
    pub assignments: Vec<NurseAssignment>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn is_doctor(&self, id: i64) -> bool {
        self.persons
            .get(&id)
            .is_some_and(|p| p.user_type == UserType::Doctor)
    }

    fn booked(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter(|e| e.status == EventStatus::Booked)
    }

    fn clashes(event: &EventRecord, slot: &Slot, kind: EventKind) -> bool {
        let (start, end) = event.window();
        start < slot.end(kind) && slot.start() < end
    }

    fn doctor_free(&self, doctor_id: i64, slot: &Slot, kind: EventKind) -> bool {
        !self
            .booked()
            .any(|e| e.doctor_id == doctor_id && Self::clashes(e, slot, kind))
    }

    fn room_free(&self, room: i64, slot: &Slot, kind: EventKind) -> bool {
        !self
            .booked()
            .any(|e| e.room == room && Self::clashes(e, slot, kind))
    }

    fn nurse_free(&self, nurse_id: i64, slot: &Slot, kind: EventKind) -> bool {
        let events: HashSet<(EventKind, i64)> = self
            .assignments
            .iter()
            .filter(|a| a.nurse_id == nurse_id)
            .map(|a| (a.kind, a.event_id))
            .collect();
        !self
            .booked()
            .any(|e| events.contains(&(e.kind, e.id)) && Self::clashes(e, slot, kind))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    begun: Arc<AtomicUsize>,
    fail_commit: Arc<AtomicBool>,
    lock_log: Arc<Mutex<Vec<Vec<ActorKey>>>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Default::default()
        }
    }

    /// Committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Actor keys passed to `lock_actors`, one entry per call.
    pub async fn locks_taken(&self) -> Vec<Vec<ActorKey>> {
        self.lock_log.lock().await.clone()
    }

    pub fn transactions_started(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    /// Makes the next transaction's commit fail as a serialization conflict.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub async fn doctor_free(&self, doctor_id: i64, slot: &Slot, kind: EventKind) -> bool {
        self.state.lock().await.doctor_free(doctor_id, slot, kind)
    }

    pub async fn room_free(&self, room: i64, slot: &Slot, kind: EventKind) -> bool {
        self.state.lock().await.room_free(room, slot, kind)
    }
}

pub struct MemoryTx {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_commit: bool,
    lock_log: Arc<Mutex<Vec<Vec<ActorKey>>>>,
}

#[async_trait]
impl AvailabilityOracle for MemoryTx {
    async fn is_doctor_available(
        &mut self,
        doctor_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        Ok(self.working.doctor_free(doctor_id, slot, kind))
    }

    async fn is_room_available(
        &mut self,
        room: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        Ok(self.working.room_free(room, slot, kind))
    }

    async fn is_nurse_available(
        &mut self,
        nurse_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        Ok(self.working.nurse_free(nurse_id, slot, kind))
    }

    async fn first_free_hospitalization_room(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<i64>> {
        let state = &self.working;
        Ok(state.hospitalization_rooms.iter().copied().find(|room| {
            !state
                .hospitalizations
                .iter()
                .any(|h| h.room == *room && h.start_date <= end && start <= h.final_date)
        }))
    }
}

#[async_trait]
impl RoleValidator for MemoryTx {
    async fn nurse_has_category(
        &mut self,
        nurse_id: i64,
        category: NurseCategory,
    ) -> StoreResult<bool> {
        Ok(self
            .working
            .nurse_categories
            .get(&nurse_id)
            .is_some_and(|c| c.contains(&category)))
    }

    async fn resolve_role(&mut self, role: &str, role_type: RoleType) -> StoreResult<Option<i64>> {
        Ok(self
            .working
            .roles
            .iter()
            .find(|r| r.name == role && r.role_type == role_type)
            .map(|r| r.id))
    }
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn lock_actors(&mut self, actors: &[ActorKey]) -> StoreResult<()> {
        // The whole state is already held; only record what was asked for.
        self.lock_log.lock().await.push(actors.to_vec());
        Ok(())
    }

    async fn doctor_practises(&mut self, doctor_id: i64, practice: &Practice) -> StoreResult<bool> {
        let state = &self.working;
        if !state.is_doctor(doctor_id) {
            return Ok(false);
        }
        let specialties = state.specialties.get(&doctor_id).cloned().unwrap_or_default();
        Ok(match practice {
            Practice::Consultation(tag) => {
                (tag == GENERAL_PRACTICE && specialties.is_empty())
                    || specialties.iter().any(|s| s == tag)
            }
            Practice::Surgery(sub) => {
                specialties.iter().any(|s| s == SURGERY_SPECIALTY)
                    && state
                        .sub_specialties
                        .get(&doctor_id)
                        .is_some_and(|subs| subs.iter().any(|s| s == sub))
            }
        })
    }

    async fn hospitalization_exists(&mut self, hospitalization_id: i64) -> StoreResult<bool> {
        Ok(self
            .working
            .hospitalizations
            .iter()
            .any(|h| h.id == hospitalization_id))
    }

    async fn insert_hospitalization(&mut self, row: &NewHospitalization) -> StoreResult<i64> {
        let id = self.working.next_id();
        self.working.hospitalizations.push(HospitalizationRecord {
            id,
            start_date: row.start_date,
            final_date: row.final_date,
            room: row.room,
            assistant_id: row.assistant_id,
            nurse_id: row.nurse_id,
        });
        Ok(id)
    }

    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<i64> {
        let id = self.working.next_id();
        self.working.events.push(EventRecord {
            id,
            kind: event.kind,
            doctor_id: event.doctor_id,
            patient_id: event.patient_id,
            slot: event.slot,
            room: event.room,
            tag: event.tag.clone(),
            status: EventStatus::Booked,
            duration: event.kind.duration_minutes(),
            hospitalization_id: event.hospitalization_id,
        });
        Ok(id)
    }

    async fn link_nurse_role(&mut self, nurse_id: i64, role_id: i64) -> StoreResult<()> {
        self.working.nurse_roles.entry(nurse_id).or_insert(role_id);
        Ok(())
    }

    async fn insert_nurse_assignment(&mut self, assignment: &NurseAssignment) -> StoreResult<()> {
        let duplicate = self.working.assignments.iter().any(|a| {
            a.kind == assignment.kind
                && a.event_id == assignment.event_id
                && a.nurse_id == assignment.nurse_id
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "nurse {} already assigned to {} {}",
                assignment.nurse_id,
                assignment.kind.as_str(),
                assignment.event_id
            )));
        }
        self.working.assignments.push(assignment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut committed,
            working,
            fail_commit,
            ..
        } = *self;
        if fail_commit {
            return Err(StoreError::Conflict(
                "could not serialize access due to concurrent update".into(),
            ));
        }
        *committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl HospitalStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let committed = self.state.clone().lock_owned().await;
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTx {
            working: committed.clone(),
            committed,
            fail_commit: self.fail_commit.swap(false, Ordering::SeqCst),
            lock_log: self.lock_log.clone(),
        }))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRow>> {
        let state = self.state.lock().await;
        Ok(state
            .persons
            .iter()
            .find(|(_, p)| p.username == username)
            .map(|(id, p)| CredentialRow {
                person_id: *id,
                person_type: p.user_type.code(),
                password_hash: p.password_hash.clone(),
            }))
    }

    async fn appointments_for_patient(
        &self,
        patient_id: i64,
    ) -> StoreResult<Vec<AppointmentSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Appointment && e.patient_id == patient_id)
            .map(|e| AppointmentSummary {
                appointment_id: e.id,
                doctor_id: e.doctor_id,
                doctor_name: state
                    .persons
                    .get(&e.doctor_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                date: e.slot.date,
                hour: i32::from(e.slot.hour),
                minutes: i32::from(e.slot.minute),
                kind: e.tag.clone(),
                room: e.room,
                status: e.status,
            })
            .collect())
    }
}

fn shared_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("1234").expect("argon2 hash"))
        .clone()
}

/// A small hospital. Every account's password is `1234`.
///
/// | id | who |
/// |---|---|
/// | 1, 3 | patients `ana`, `bia` |
/// | 2 | assistant `rui` |
/// | 8 | doctor, CARDIOLOGIA |
/// | 9 | doctor, CIRURGIA / ORTOPEDIA |
/// | 10 | doctor, no specialty |
/// | 11 | doctor, CIRURGIA / ORTOPEDIA |
/// | 12, 20 | CONSULTAS nurses |
/// | 13, 14 | CIRURGIAS nurses |
/// | 19 | HOSPITALIZACOES nurse |
///
/// Hospitalization rooms 100 and 101.
pub fn fixture() -> MemoryStore {
    let hash = shared_password_hash();
    let mut state = MemoryState {
        next_id: 1000,
        ..Default::default()
    };

    let people = [
        (1, "Ana", "ana", UserType::Patient),
        (2, "Rui", "rui", UserType::Assistant),
        (3, "Bia", "bia", UserType::Patient),
        (8, "Marta", "marta", UserType::Doctor),
        (9, "Carlos", "carlos", UserType::Doctor),
        (10, "Rodrigo", "rodrigo", UserType::Doctor),
        (11, "Sofia", "sofia", UserType::Doctor),
        (12, "Ines", "ines", UserType::Nurse),
        (13, "Joao", "joao", UserType::Nurse),
        (14, "Sara", "sara", UserType::Nurse),
        (19, "Teresa", "teresa", UserType::Nurse),
        (20, "Luis", "luis", UserType::Nurse),
    ];
    for (id, name, username, user_type) in people {
        state.persons.insert(
            id,
            Person {
                name: name.into(),
                username: username.into(),
                password_hash: hash.clone(),
                user_type,
            },
        );
    }

    state.specialties.insert(8, vec!["CARDIOLOGIA".into()]);
    state.specialties.insert(9, vec![SURGERY_SPECIALTY.into()]);
    state.sub_specialties.insert(9, vec!["ORTOPEDIA".into()]);
    state.specialties.insert(11, vec![SURGERY_SPECIALTY.into()]);
    state.sub_specialties.insert(11, vec!["ORTOPEDIA".into()]);

    for (nurse, category) in [
        (12, NurseCategory::Consultations),
        (20, NurseCategory::Consultations),
        (13, NurseCategory::Surgeries),
        (14, NurseCategory::Surgeries),
        (19, NurseCategory::Hospitalizations),
    ] {
        state.nurse_categories.entry(nurse).or_default().insert(category);
    }

    for (id, name, role_type) in [
        (1, "TRIAGEM", RoleType::Appointment),
        (2, "ACOMPANHANTE", RoleType::Appointment),
        (3, "MONITOR", RoleType::Surgery),
        (4, "ANESTESISTA", RoleType::Surgery),
        (5, "INSTRUMENTISTA", RoleType::Surgery),
    ] {
        state.roles.push(RoleDef {
            id,
            name: name.into(),
            role_type,
        });
    }

    state.hospitalization_rooms = vec![100, 101];

    MemoryStore::new(state)
}
