// src/store/postgres.rs

//! Postgres-backed store. Availability, room allocation and overlap rules live
//! in SQL functions (see `migrations/`); this adapter only calls them.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::{AppointmentSummary, CredentialRow};
use crate::scheduling::{
    ActorKey, EventKind, EventStatus, GENERAL_PRACTICE, NewEvent, NewHospitalization,
    NurseAssignment, NurseCategory, Practice, RoleType, SURGERY_SPECIALTY, Slot, StoreError,
    StoreResult,
    ports::{AvailabilityOracle, BookingTx, HospitalStore, RoleValidator},
};

/// SQLSTATEs that mean "another transaction got there first".
const CONFLICT_STATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "23505", // unique_violation
    "23P01", // exclusion_violation
];

fn db_err(e: sqlx::Error) -> StoreError {
    let conflict = e
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| CONFLICT_STATES.contains(&&*code));
    if conflict {
        StoreError::Conflict(e.to_string())
    } else {
        StoreError::Database(e.to_string())
    }
}

#[derive(Clone, Copy)]
enum Actor {
    Doctor,
    Room,
    Nurse,
}

fn availability_query(actor: Actor, kind: EventKind) -> &'static str {
    match (actor, kind) {
        (Actor::Doctor, EventKind::Appointment) => {
            "SELECT is_doctor_available_for_appointment($1, $2, $3, $4)"
        }
        (Actor::Doctor, EventKind::Surgery) => {
            "SELECT is_doctor_available_for_surgery($1, $2, $3, $4)"
        }
        (Actor::Room, EventKind::Appointment) => {
            "SELECT is_room_available_for_appointment($1, $2, $3, $4)"
        }
        (Actor::Room, EventKind::Surgery) => "SELECT is_room_available_for_surgery($1, $2, $3, $4)",
        (Actor::Nurse, EventKind::Appointment) => {
            "SELECT is_nurse_available_for_appointment($1, $2, $3, $4)"
        }
        (Actor::Nurse, EventKind::Surgery) => {
            "SELECT is_nurse_available_for_surgery($1, $2, $3, $4)"
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn available(
        &mut self,
        actor: Actor,
        id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        let free: Option<bool> = sqlx::query_scalar(availability_query(actor, kind))
            .bind(id)
            .bind(slot.date)
            .bind(i32::from(slot.hour))
            .bind(i32::from(slot.minute))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(free.unwrap_or(false))
    }
}

#[async_trait]
impl AvailabilityOracle for PgTx {
    async fn is_doctor_available(
        &mut self,
        doctor_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        self.available(Actor::Doctor, doctor_id, slot, kind).await
    }

    async fn is_room_available(
        &mut self,
        room: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        self.available(Actor::Room, room, slot, kind).await
    }

    async fn is_nurse_available(
        &mut self,
        nurse_id: i64,
        slot: &Slot,
        kind: EventKind,
    ) -> StoreResult<bool> {
        self.available(Actor::Nurse, nurse_id, slot, kind).await
    }

    async fn first_free_hospitalization_room(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<i64>> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT get_first_available_room($1, $2)")
            .bind(start)
            .bind(end)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl RoleValidator for PgTx {
    async fn nurse_has_category(
        &mut self,
        nurse_id: i64,
        category: NurseCategory,
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM nurses_categories AS nsc
                JOIN nurse_categories AS nc ON nc.category_id = nsc.category_id
                JOIN persons AS p ON p.person_id = nsc.nurse_id
                WHERE nsc.nurse_id = $1 AND nc.category = $2 AND p.person_type = 3
            )
            "#,
        )
        .bind(nurse_id)
        .bind(category.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn resolve_role(&mut self, role: &str, role_type: RoleType) -> StoreResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT role_id
            FROM roles
            WHERE role = $1 AND role_type = $2
            "#,
        )
        .bind(role)
        .bind(role_type.code())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl BookingTx for PgTx {
    async fn lock_actors(&mut self, actors: &[ActorKey]) -> StoreResult<()> {
        // Held until commit/rollback.
        for actor in actors {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(actor.lock_name())
                .execute(&mut *self.tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn doctor_practises(&mut self, doctor_id: i64, practice: &Practice) -> StoreResult<bool> {
        let query = match practice {
            Practice::Consultation(_) => {
                r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM persons AS p
                    LEFT JOIN specialisations_doctors AS sd ON sd.doctor_id = p.person_id
                    LEFT JOIN specialisations AS s ON s.spec_id = sd.spec_id
                    WHERE p.person_type = 2 AND p.person_id = $1
                      AND (($2 = $3 AND sd.spec_id IS NULL) OR s.specialization = $2)
                )
                "#
            }
            Practice::Surgery(_) => {
                r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM persons AS p
                    JOIN specialisations_doctors AS sd ON sd.doctor_id = p.person_id
                    JOIN specialisations AS s ON s.spec_id = sd.spec_id
                    JOIN sub_specialisations_doctors AS ssd ON ssd.doctor_id = p.person_id
                    JOIN sub_specialisations AS ss ON ss.sub_spec_id = ssd.sub_spec_id
                    WHERE p.person_type = 2 AND p.person_id = $1
                      AND s.specialization = $3 AND ss.sub_spec = $2
                )
                "#
            }
        };
        let (tag, anchor) = match practice {
            Practice::Consultation(tag) => (tag.as_str(), GENERAL_PRACTICE),
            Practice::Surgery(sub) => (sub.as_str(), SURGERY_SPECIALTY),
        };

        sqlx::query_scalar::<_, bool>(query)
            .bind(doctor_id)
            .bind(tag)
            .bind(anchor)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)
    }

    async fn hospitalization_exists(&mut self, hospitalization_id: i64) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM hospitalizations WHERE hosp_id = $1)",
        )
        .bind(hospitalization_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn insert_hospitalization(&mut self, row: &NewHospitalization) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO hospitalizations (start_date, final_date, room, assistant_id, nurse_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING hosp_id
            "#,
        )
        .bind(row.start_date)
        .bind(row.final_date)
        .bind(row.room)
        .bind(row.assistant_id)
        .bind(row.nurse_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<i64> {
        let query = match event.kind {
            EventKind::Appointment => {
                r#"
                INSERT INTO appointments
                    (doctor_id, patient_id, app_date, app_hour, app_minutes, app_type, app_room,
                     app_status, app_duration)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING appointment_id
                "#
            }
            EventKind::Surgery => {
                r#"
                INSERT INTO surgeries
                    (doctor_id, patient_id, surgery_date, surgery_hour, surgery_minutes,
                     surgery_type, surgery_room, surgery_status, surgery_duration, hosp_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING surgery_id
                "#
            }
        };

        let mut q = sqlx::query_scalar::<_, i64>(query)
            .bind(event.doctor_id)
            .bind(event.patient_id)
            .bind(event.slot.date)
            .bind(i32::from(event.slot.hour))
            .bind(i32::from(event.slot.minute))
            .bind(&event.tag)
            .bind(event.room)
            .bind(EventStatus::Booked as i16)
            .bind(event.kind.duration_minutes());
        if event.kind == EventKind::Surgery {
            q = q.bind(event.hospitalization_id);
        }

        q.fetch_one(&mut *self.tx).await.map_err(db_err)
    }

    async fn link_nurse_role(&mut self, nurse_id: i64, role_id: i64) -> StoreResult<()> {
        // First recorded role wins.
        sqlx::query(
            r#"
            INSERT INTO nurses_roles (nurse_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (nurse_id) DO NOTHING
            "#,
        )
        .bind(nurse_id)
        .bind(role_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_nurse_assignment(&mut self, a: &NurseAssignment) -> StoreResult<()> {
        let query = match a.kind {
            EventKind::Appointment => {
                r#"
                INSERT INTO roles_appointments (nurse_id, role_id, app_id, doctor_id, patient_id)
                VALUES ($1, $2, $3, $4, $5)
                "#
            }
            EventKind::Surgery => {
                r#"
                INSERT INTO roles_surgeries (nurse_id, role_id, surgery_id, doctor_id, patient_id)
                VALUES ($1, $2, $3, $4, $5)
                "#
            }
        };
        sqlx::query(query)
            .bind(a.nurse_id)
            .bind(a.role_id)
            .bind(a.event_id)
            .bind(a.doctor_id)
            .bind(a.patient_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_err)
    }
}

#[async_trait]
impl HospitalStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRow>> {
        sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT person_id, person_type, person_password AS password_hash
            FROM persons
            WHERE person_username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn appointments_for_patient(
        &self,
        patient_id: i64,
    ) -> StoreResult<Vec<AppointmentSummary>> {
        let rows = sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT a.appointment_id, a.doctor_id, d.person_name AS doctor_name,
                   a.app_date, a.app_hour, a.app_minutes, a.app_type, a.app_room, a.app_status
            FROM appointments AS a
            JOIN persons AS d ON d.person_id = a.doctor_id
            WHERE a.patient_id = $1
            ORDER BY a.app_date, a.app_hour, a.app_minutes
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(AppointmentRow::into_summary).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: i64,
    doctor_id: i64,
    doctor_name: String,
    app_date: NaiveDate,
    app_hour: i32,
    app_minutes: i32,
    app_type: String,
    app_room: i64,
    app_status: i16,
}

impl AppointmentRow {
    fn into_summary(self) -> StoreResult<AppointmentSummary> {
        let status = EventStatus::from_code(self.app_status).ok_or_else(|| {
            StoreError::Database(format!(
                "appointment {} has unknown status {}",
                self.appointment_id, self.app_status
            ))
        })?;
        Ok(AppointmentSummary {
            appointment_id: self.appointment_id,
            doctor_id: self.doctor_id,
            doctor_name: self.doctor_name,
            date: self.app_date,
            hour: self.app_hour,
            minutes: self.app_minutes,
            kind: self.app_type,
            room: self.app_room,
            status,
        })
    }
}
