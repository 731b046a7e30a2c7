pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentForm, SchedulingError, ServiceRecord, TherapistRecord,
};

/// Persistence seam for the appointment store. The production implementation
/// talks PostgREST; tests use the in-memory one.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Full-row save keyed by `appointment.id`.
    async fn update(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError>;

    async fn find_for_therapist_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn find_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError>;

    async fn find_scheduled_on(&self, date: NaiveDate)
        -> Result<Vec<Appointment>, SchedulingError>;

    /// Most recent `scheduled` appointment for a canonical phone, latest date
    /// first. Used by the reply reconciler.
    async fn find_latest_scheduled_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<Appointment>, SchedulingError>;

    /// Increment the reminder counter and stamp `last_reminder_sent` as one
    /// atomic write, so overlapping dispatcher runs cannot double-count.
    async fn record_reminder_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), SchedulingError>;

    async fn insert_form(&self, form: AppointmentForm)
        -> Result<AppointmentForm, SchedulingError>;

    async fn get_form(&self, id: Uuid) -> Result<Option<AppointmentForm>, SchedulingError>;

    async fn update_form(&self, form: &AppointmentForm)
        -> Result<AppointmentForm, SchedulingError>;
}

/// Read-mostly collaborators referenced by id from the scheduling core.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn get_therapist(&self, id: Uuid) -> Result<Option<TherapistRecord>, SchedulingError>;

    async fn list_therapists(&self) -> Result<Vec<TherapistRecord>, SchedulingError>;

    async fn get_service(&self, id: Uuid) -> Result<Option<ServiceRecord>, SchedulingError>;

    /// Find a guardian by canonical phone or create one from the booking
    /// snapshot. Public-form bookings go through this.
    async fn resolve_or_create_guardian(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Uuid, SchedulingError>;

    async fn resolve_or_create_patient(
        &self,
        guardian_id: Uuid,
        name: &str,
    ) -> Result<Uuid, SchedulingError>;
}
