// libs/scheduling-cell/src/repository/memory.rs
//
// In-memory repositories backing service-level tests and local development.
// Semantics mirror the PostgREST implementation, including the atomic
// reminder-counter update.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentForm, AppointmentStatus, SchedulingError, ServiceRecord,
    TherapistRecord,
};
use crate::repository::{AppointmentRepository, DirectoryRepository};

#[derive(Default)]
pub struct MemorySchedulingRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    forms: RwLock<HashMap<Uuid, AppointmentForm>>,
}

impl MemorySchedulingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentRepository for MemorySchedulingRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let mut store = self.appointments.write().await;
        store.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let mut store = self.appointments.write().await;
        if !store.contains_key(&appointment.id) {
            return Err(SchedulingError::NotFound("Appointment".to_string()));
        }
        store.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_for_therapist_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.therapist_id == Some(therapist_id) && a.date == date)
            .cloned()
            .collect())
    }

    async fn find_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.date == date)
            .cloned()
            .collect())
    }

    async fn find_scheduled_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.date == date && a.status == AppointmentStatus::Scheduled)
            .cloned()
            .collect())
    }

    async fn find_latest_scheduled_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.phone == phone && a.status == AppointmentStatus::Scheduled)
            .max_by_key(|a| (a.date, a.created_at))
            .cloned())
    }

    async fn record_reminder_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        let mut store = self.appointments.write().await;
        let appointment = store
            .get_mut(&id)
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;
        appointment.reminders_sent += 1;
        appointment.last_reminder_sent = Some(at);
        appointment.updated_at = at;
        Ok(())
    }

    async fn insert_form(
        &self,
        form: AppointmentForm,
    ) -> Result<AppointmentForm, SchedulingError> {
        let mut store = self.forms.write().await;
        store.insert(form.id, form.clone());
        Ok(form)
    }

    async fn get_form(&self, id: Uuid) -> Result<Option<AppointmentForm>, SchedulingError> {
        Ok(self.forms.read().await.get(&id).cloned())
    }

    async fn update_form(
        &self,
        form: &AppointmentForm,
    ) -> Result<AppointmentForm, SchedulingError> {
        let mut store = self.forms.write().await;
        if !store.contains_key(&form.id) {
            return Err(SchedulingError::NotFound("Appointment request".to_string()));
        }
        store.insert(form.id, form.clone());
        Ok(form.clone())
    }
}

#[derive(Default)]
pub struct MemoryDirectoryRepository {
    staff: RwLock<HashMap<Uuid, TherapistRecord>>,
    services: RwLock<HashMap<Uuid, ServiceRecord>>,
    guardians: RwLock<HashMap<String, Uuid>>,
    patients: RwLock<HashMap<(Uuid, String), Uuid>>,
}

impl MemoryDirectoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_staff(&self, name: &str, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.staff.write().await.insert(
            id,
            TherapistRecord {
                id,
                name: name.to_string(),
                role: role.to_string(),
            },
        );
        id
    }

    pub async fn add_therapist(&self, name: &str) -> Uuid {
        self.add_staff(name, "therapist").await
    }

    pub async fn add_service(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.services.write().await.insert(
            id,
            ServiceRecord {
                id,
                name: name.to_string(),
            },
        );
        id
    }
}

#[async_trait]
impl DirectoryRepository for MemoryDirectoryRepository {
    async fn get_therapist(
        &self,
        id: Uuid,
    ) -> Result<Option<TherapistRecord>, SchedulingError> {
        Ok(self.staff.read().await.get(&id).cloned())
    }

    async fn list_therapists(&self) -> Result<Vec<TherapistRecord>, SchedulingError> {
        let mut therapists: Vec<TherapistRecord> = self
            .staff
            .read()
            .await
            .values()
            .filter(|t| t.role == "therapist")
            .cloned()
            .collect();
        therapists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(therapists)
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<ServiceRecord>, SchedulingError> {
        Ok(self.services.read().await.get(&id).cloned())
    }

    async fn resolve_or_create_guardian(
        &self,
        _name: &str,
        phone: &str,
        _email: Option<&str>,
    ) -> Result<Uuid, SchedulingError> {
        let mut guardians = self.guardians.write().await;
        let id = guardians
            .entry(phone.to_string())
            .or_insert_with(Uuid::new_v4);
        Ok(*id)
    }

    async fn resolve_or_create_patient(
        &self,
        guardian_id: Uuid,
        name: &str,
    ) -> Result<Uuid, SchedulingError> {
        let mut patients = self.patients.write().await;
        let id = patients
            .entry((guardian_id, name.to_string()))
            .or_insert_with(Uuid::new_v4);
        Ok(*id)
    }
}
