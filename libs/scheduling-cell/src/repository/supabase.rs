// libs/scheduling-cell/src/repository/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentForm, SchedulingError, ServiceRecord, TherapistRecord,
};
use crate::repository::{AppointmentRepository, DirectoryRepository};

const APPOINTMENTS: &str = "appointments";
const FORMS: &str = "appointment_forms";

pub struct SupabaseSchedulingRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSchedulingRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows<T: serde::de::DeserializeOwned>(
        rows: Vec<Value>,
    ) -> Result<Vec<T>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| SchedulingError::Database(format!("failed to parse rows: {}", e)))
    }

    fn first_row<T: serde::de::DeserializeOwned>(
        rows: Vec<Value>,
    ) -> Result<Option<T>, SchedulingError> {
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }
}

fn db_err(e: anyhow::Error) -> SchedulingError {
    SchedulingError::Database(e.to_string())
}

#[async_trait]
impl AppointmentRepository for SupabaseSchedulingRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let row = serde_json::to_value(&appointment)
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        let rows = self.supabase.insert(APPOINTMENTS, row).await.map_err(db_err)?;
        Self::first_row(rows)?
            .ok_or_else(|| SchedulingError::Database("insert returned no rows".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let rows = self
            .supabase
            .select(APPOINTMENTS, &format!("id=eq.{}", id))
            .await
            .map_err(db_err)?;
        Self::first_row(rows)
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let patch = serde_json::to_value(appointment)
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        let rows = self
            .supabase
            .update(APPOINTMENTS, &format!("id=eq.{}", appointment.id), patch)
            .await
            .map_err(db_err)?;
        Self::first_row(rows)?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))
    }

    async fn find_for_therapist_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching appointments for therapist {} on {}", therapist_id, date);
        let filters = format!("therapist_id=eq.{}&date=eq.{}", therapist_id, date);
        let rows = self.supabase.select(APPOINTMENTS, &filters).await.map_err(db_err)?;
        Self::parse_rows(rows)
    }

    async fn find_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        let rows = self
            .supabase
            .select(APPOINTMENTS, &format!("date=eq.{}", date))
            .await
            .map_err(db_err)?;
        Self::parse_rows(rows)
    }

    async fn find_scheduled_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let filters = format!("date=eq.{}&status=eq.scheduled", date);
        let rows = self.supabase.select(APPOINTMENTS, &filters).await.map_err(db_err)?;
        Self::parse_rows(rows)
    }

    async fn find_latest_scheduled_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let filters = format!(
            "phone=eq.{}&status=eq.scheduled&order=date.desc,created_at.desc&limit=1",
            phone
        );
        let rows = self.supabase.select(APPOINTMENTS, &filters).await.map_err(db_err)?;
        Self::first_row(rows)
    }

    async fn record_reminder_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        // Single RPC so the counter increment and timestamp commit together.
        // The SQL function returns the updated row.
        let body = json!({
            "p_appointment_id": id,
            "p_sent_at": at.to_rfc3339(),
        });
        let _: Value = self
            .supabase
            .request(Method::POST, "/rest/v1/rpc/record_reminder_sent", Some(body))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_form(
        &self,
        form: AppointmentForm,
    ) -> Result<AppointmentForm, SchedulingError> {
        let row =
            serde_json::to_value(&form).map_err(|e| SchedulingError::Database(e.to_string()))?;
        let rows = self.supabase.insert(FORMS, row).await.map_err(db_err)?;
        Self::first_row(rows)?
            .ok_or_else(|| SchedulingError::Database("insert returned no rows".to_string()))
    }

    async fn get_form(&self, id: Uuid) -> Result<Option<AppointmentForm>, SchedulingError> {
        let rows = self
            .supabase
            .select(FORMS, &format!("id=eq.{}", id))
            .await
            .map_err(db_err)?;
        Self::first_row(rows)
    }

    async fn update_form(
        &self,
        form: &AppointmentForm,
    ) -> Result<AppointmentForm, SchedulingError> {
        let patch =
            serde_json::to_value(form).map_err(|e| SchedulingError::Database(e.to_string()))?;
        let rows = self
            .supabase
            .update(FORMS, &format!("id=eq.{}", form.id), patch)
            .await
            .map_err(db_err)?;
        Self::first_row(rows)?
            .ok_or_else(|| SchedulingError::NotFound("Appointment request".to_string()))
    }
}

pub struct SupabaseDirectoryRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectoryRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DirectoryRepository for SupabaseDirectoryRepository {
    async fn get_therapist(
        &self,
        id: Uuid,
    ) -> Result<Option<TherapistRecord>, SchedulingError> {
        let rows = self
            .supabase
            .select("staff", &format!("id=eq.{}&select=id,name,role", id))
            .await
            .map_err(db_err)?;
        SupabaseSchedulingRepository::first_row(rows)
    }

    async fn list_therapists(&self) -> Result<Vec<TherapistRecord>, SchedulingError> {
        let rows = self
            .supabase
            .select("staff", "role=eq.therapist&select=id,name,role&order=name.asc")
            .await
            .map_err(db_err)?;
        SupabaseSchedulingRepository::parse_rows(rows)
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<ServiceRecord>, SchedulingError> {
        let rows = self
            .supabase
            .select("services", &format!("id=eq.{}&select=id,name", id))
            .await
            .map_err(db_err)?;
        SupabaseSchedulingRepository::first_row(rows)
    }

    async fn resolve_or_create_guardian(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Uuid, SchedulingError> {
        let rows = self
            .supabase
            .select("guardians", &format!("phone=eq.{}&select=id", phone))
            .await
            .map_err(db_err)?;
        if let Some(row) = rows.first() {
            if let Some(id) = row.get("id").and_then(|v| v.as_str()) {
                return Uuid::parse_str(id)
                    .map_err(|e| SchedulingError::Database(e.to_string()));
            }
        }

        let id = Uuid::new_v4();
        let row = json!({ "id": id, "name": name, "phone": phone, "email": email });
        self.supabase.insert("guardians", row).await.map_err(db_err)?;
        Ok(id)
    }

    async fn resolve_or_create_patient(
        &self,
        guardian_id: Uuid,
        name: &str,
    ) -> Result<Uuid, SchedulingError> {
        let filters = format!("guardian_id=eq.{}&name=eq.{}&select=id", guardian_id, name);
        let rows = self.supabase.select("patients", &filters).await.map_err(db_err)?;
        if let Some(row) = rows.first() {
            if let Some(id) = row.get("id").and_then(|v| v.as_str()) {
                return Uuid::parse_str(id)
                    .map_err(|e| SchedulingError::Database(e.to_string()));
            }
        }

        let id = Uuid::new_v4();
        let row = json!({ "id": id, "guardian_id": guardian_id, "name": name });
        self.supabase.insert("patients", row).await.map_err(db_err)?;
        Ok(id)
    }
}
