// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_models::auth::{User, ROLE_THERAPIST};
use shared_utils::clock::Clock;
use shared_utils::phone::canonical_phone;

use crate::models::{
    Appointment, AppointmentForm, AppointmentStatus, AssignTherapistRequest, BookingChannel,
    ConflictingSlot, ConvertFormRequest, CreateAppointmentRequest, FormStatus, PaymentInfo,
    RescheduleAppointmentRequest, SchedulingError, SubmitAppointmentFormRequest,
    TherapistRecord,
};
use crate::repository::{AppointmentRepository, DirectoryRepository};
use crate::services::conflict::{ConflictDetectionService, SlotLockRegistry};
use crate::services::lifecycle::{AppointmentLifecycleService, MANUAL_STATUSES};
use crate::services::timeslot;
use crate::SchedulingState;

pub struct SchedulingService {
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn DirectoryRepository>,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    slot_locks: Arc<SlotLockRegistry>,
    clock: Arc<dyn Clock>,
}

impl SchedulingService {
    pub fn new(state: &SchedulingState) -> Self {
        Self {
            appointments: Arc::clone(&state.appointments),
            directory: Arc::clone(&state.directory),
            conflicts: ConflictDetectionService::new(Arc::clone(&state.appointments)),
            lifecycle: AppointmentLifecycleService::new(),
            slot_locks: Arc::clone(&state.slot_locks),
            clock: Arc::clone(&state.clock),
        }
    }

    // ==========================================================================
    // APPOINTMENT LIFECYCLE OPERATIONS
    // ==========================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let channel = request.channel.unwrap_or(BookingChannel::Staff);
        info!(
            "Creating appointment for {} on {} ({} - {}) via {:?}",
            request.patient_name, request.date, request.start_time, request.end_time, channel
        );

        require_field(&request.patient_name, "patient_name")?;
        require_field(&request.phone, "phone")?;
        validate_slot(&request.start_time, &request.end_time)?;

        if channel == BookingChannel::Public && request.consent != Some(true) {
            return Err(SchedulingError::Validation(
                "consent is required for public bookings".to_string(),
            ));
        }

        self.directory
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Service".to_string()))?;

        let therapist = match request.therapist_id {
            Some(id) => Some(self.require_therapist(id).await?),
            None => None,
        };

        let phone = canonical_phone(&request.phone);
        if phone.is_empty() {
            return Err(SchedulingError::Validation(
                "phone must contain digits".to_string(),
            ));
        }

        let guardian_id = match request.guardian_id {
            Some(id) => id,
            None => {
                let guardian_name = request
                    .guardian_name
                    .as_deref()
                    .unwrap_or(&request.patient_name);
                self.directory
                    .resolve_or_create_guardian(guardian_name, &phone, request.email.as_deref())
                    .await?
            }
        };

        let patient_id = match request.patient_id {
            Some(id) => id,
            None => {
                self.directory
                    .resolve_or_create_patient(guardian_id, &request.patient_name)
                    .await?
            }
        };

        let now = self.clock.now_utc();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            guardian_id,
            therapist_id: therapist.as_ref().map(|t| t.id),
            service_id: request.service_id,
            patient_name: request.patient_name,
            phone,
            email: request.email,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            appointment_type: request.appointment_type,
            status: if therapist.is_some() {
                AppointmentStatus::Scheduled
            } else {
                AppointmentStatus::PendingAssignment
            },
            channel,
            payment: PaymentInfo::default(),
            total_sessions: request.total_sessions.unwrap_or(1),
            sessions_paid: 0,
            sessions_completed: 0,
            reminders_sent: 0,
            last_reminder_sent: None,
            assigned_by: None,
            assigned_at: None,
            cancelled_at: None,
            completed_at: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        match &therapist {
            Some(t) => {
                // Conflict check and insert commit under the same advisory
                // lock, so a concurrent booking for this therapist/date waits
                // until this row is visible.
                let _guard = self.slot_locks.acquire(t.id, appointment.date).await;
                self.conflicts
                    .ensure_free(
                        t.id,
                        appointment.date,
                        &appointment.start_time,
                        &appointment.end_time,
                        None,
                    )
                    .await?;
                self.appointments.insert(appointment).await
            }
            // Nothing to conflict against until a therapist is assigned.
            None => self.appointments.insert(appointment).await,
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.appointments
            .get(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))
    }

    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(id).await?;
        validate_slot(&request.start_time, &request.end_time)?;

        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Rescheduled)?;

        let target_therapist = match request.therapist_id {
            Some(tid) => {
                if appointment.therapist_id != Some(tid) {
                    self.require_therapist(tid).await?;
                }
                Some(tid)
            }
            None => appointment.therapist_id,
        };

        let now = self.clock.now_utc();
        let note = match &request.reason {
            Some(reason) => format!(
                "Rescheduled to {} {} - {}: {}",
                request.date, request.start_time, request.end_time, reason
            ),
            None => format!(
                "Rescheduled to {} {} - {}",
                request.date, request.start_time, request.end_time
            ),
        };

        let apply = |appointment: &mut Appointment| {
            appointment.date = request.date;
            appointment.start_time = request.start_time.clone();
            appointment.end_time = request.end_time.clone();
            appointment.therapist_id = target_therapist;
            appointment.status = AppointmentStatus::Rescheduled;
            appointment.append_note(&note);
            appointment.updated_at = now;
        };

        match target_therapist {
            Some(tid) => {
                let _guard = self.slot_locks.acquire(tid, request.date).await;
                self.conflicts
                    .ensure_free(
                        tid,
                        request.date,
                        &request.start_time,
                        &request.end_time,
                        Some(id),
                    )
                    .await?;
                apply(&mut appointment);
                self.appointments.update(&appointment).await
            }
            None => {
                apply(&mut appointment);
                self.appointments.update(&appointment).await
            }
        }
    }

    /// Manual status edit, restricted to the staff-facing status set.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
        actor: &User,
    ) -> Result<Appointment, SchedulingError> {
        if !self.lifecycle.is_manual_status(new_status) {
            return Err(SchedulingError::Validation(format!(
                "status must be one of {}",
                MANUAL_STATUSES
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut appointment = self.get_appointment(id).await?;
        self.authorize_mutation(&appointment, actor)?;

        if appointment.status == new_status {
            return Ok(appointment);
        }

        self.lifecycle
            .validate_status_transition(appointment.status, new_status)?;

        let now = self.clock.now_utc();
        appointment.status = new_status;
        match new_status {
            AppointmentStatus::Cancelled => appointment.cancelled_at = Some(now),
            AppointmentStatus::Completed => {
                appointment.completed_at = Some(now);
                appointment.sessions_completed += 1;
            }
            _ => {}
        }
        appointment.updated_at = now;

        self.appointments.update(&appointment).await
    }

    pub async fn assign_therapist(
        &self,
        id: Uuid,
        request: AssignTherapistRequest,
        actor: &User,
    ) -> Result<Appointment, SchedulingError> {
        if !actor.is_staff_admin() {
            return Err(SchedulingError::Forbidden(
                "only admin or receptionist may assign therapists".to_string(),
            ));
        }

        let mut appointment = self.get_appointment(id).await?;
        if appointment.status != AppointmentStatus::PendingAssignment {
            return Err(SchedulingError::Validation(format!(
                "appointment is {}, not awaiting therapist assignment",
                appointment.status
            )));
        }

        let therapist = self.require_therapist(request.therapist_id).await?;

        let _guard = self.slot_locks.acquire(therapist.id, appointment.date).await;
        self.conflicts
            .ensure_free(
                therapist.id,
                appointment.date,
                &appointment.start_time,
                &appointment.end_time,
                Some(id),
            )
            .await?;

        let now = self.clock.now_utc();
        appointment.therapist_id = Some(therapist.id);
        appointment.status = AppointmentStatus::Scheduled;
        appointment.assigned_by = Uuid::parse_str(&actor.id).ok();
        appointment.assigned_at = Some(now);
        appointment.updated_at = now;

        self.appointments.update(&appointment).await
    }

    pub async fn check_conflict(
        &self,
        therapist_id: Uuid,
        date: chrono::NaiveDate,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<ConflictingSlot>, SchedulingError> {
        validate_slot(start_time, end_time)?;
        self.conflicts
            .find_conflict(therapist_id, date, start_time, end_time, exclude_id)
            .await
    }

    // ==========================================================================
    // APPOINTMENT REQUEST (INTAKE FORM) OPERATIONS
    // ==========================================================================

    pub async fn submit_form(
        &self,
        request: SubmitAppointmentFormRequest,
    ) -> Result<AppointmentForm, SchedulingError> {
        require_field(&request.parent_name, "parent_name")?;
        require_field(&request.child_name, "child_name")?;
        require_field(&request.phone, "phone")?;

        if request.consent != Some(true) {
            return Err(SchedulingError::Validation(
                "consent is required".to_string(),
            ));
        }

        self.directory
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Service".to_string()))?;

        let phone = canonical_phone(&request.phone);
        if phone.is_empty() {
            return Err(SchedulingError::Validation(
                "phone must contain digits".to_string(),
            ));
        }

        let now = self.clock.now_utc();
        let form = AppointmentForm {
            id: Uuid::new_v4(),
            parent_name: request.parent_name,
            child_name: request.child_name,
            child_age: request.child_age,
            phone,
            email: request.email,
            service_id: request.service_id,
            preferred_date: request.preferred_date,
            preferred_time: request.preferred_time,
            consent: true,
            notes: request.notes,
            status: FormStatus::Pending,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        };

        self.appointments.insert_form(form).await
    }

    /// Convert a pending intake request into a formal appointment. The form is
    /// never mutated after conversion apart from its status flag and link.
    pub async fn convert_form(
        &self,
        form_id: Uuid,
        request: ConvertFormRequest,
    ) -> Result<Appointment, SchedulingError> {
        let mut form = self
            .appointments
            .get_form(form_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment request".to_string()))?;

        if form.status != FormStatus::Pending {
            return Err(SchedulingError::Validation(format!(
                "appointment request is already {:?}",
                form.status
            )));
        }

        let appointment = self
            .create_appointment(CreateAppointmentRequest {
                patient_name: form.child_name.clone(),
                guardian_name: Some(form.parent_name.clone()),
                phone: form.phone.clone(),
                email: form.email.clone(),
                patient_id: None,
                guardian_id: None,
                therapist_id: request.therapist_id,
                service_id: form.service_id,
                date: request.date,
                start_time: request.start_time,
                end_time: request.end_time,
                appointment_type: request.appointment_type,
                channel: Some(BookingChannel::RequestConversion),
                consent: Some(form.consent),
                total_sessions: request.total_sessions,
                notes: form.notes.clone(),
            })
            .await?;

        form.status = FormStatus::Converted;
        form.appointment_id = Some(appointment.id);
        form.updated_at = self.clock.now_utc();
        self.appointments.update_form(&form).await?;

        info!("Converted appointment request {} into appointment {}", form.id, appointment.id);
        Ok(appointment)
    }

    pub async fn cancel_form(&self, form_id: Uuid) -> Result<AppointmentForm, SchedulingError> {
        let mut form = self
            .appointments
            .get_form(form_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment request".to_string()))?;

        if form.status != FormStatus::Pending {
            return Err(SchedulingError::Validation(format!(
                "appointment request is already {:?}",
                form.status
            )));
        }

        form.status = FormStatus::Cancelled;
        form.updated_at = self.clock.now_utc();
        self.appointments.update_form(&form).await
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn require_therapist(&self, id: Uuid) -> Result<TherapistRecord, SchedulingError> {
        let record = self
            .directory
            .get_therapist(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Therapist".to_string()))?;

        if record.role != ROLE_THERAPIST {
            warn!("Staff member {} has role {}, not therapist", record.id, record.role);
            return Err(SchedulingError::Validation(format!(
                "staff member {} is not a therapist",
                record.name
            )));
        }

        Ok(record)
    }

    fn authorize_mutation(
        &self,
        appointment: &Appointment,
        actor: &User,
    ) -> Result<(), SchedulingError> {
        if actor.is_staff_admin() {
            return Ok(());
        }
        if actor.has_role(ROLE_THERAPIST)
            && appointment.therapist_id.map(|t| t.to_string()).as_deref() == Some(actor.id.as_str())
        {
            return Ok(());
        }
        Err(SchedulingError::Forbidden(
            "not allowed to modify this appointment".to_string(),
        ))
    }
}

fn require_field(value: &str, field: &str) -> Result<(), SchedulingError> {
    if value.trim().is_empty() {
        return Err(SchedulingError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_slot(start_time: &str, end_time: &str) -> Result<(), SchedulingError> {
    if timeslot::duration(start_time, end_time)? <= 0 {
        return Err(SchedulingError::Validation(
            "end time must be after start time".to_string(),
        ));
    }
    Ok(())
}
