// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::services::timeslot::MalformedTimeError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Parent/guardian who requested the booking.
    pub guardian_id: Uuid,
    /// Unset while the appointment is awaiting therapist assignment.
    pub therapist_id: Option<Uuid>,
    pub service_id: Uuid,
    // Contact snapshot taken at booking time.
    pub patient_name: String,
    /// Stored in canonical form (see shared_utils::phone).
    pub phone: String,
    pub email: Option<String>,
    pub date: NaiveDate,
    /// Slot-formatted, e.g. "09:15 AM".
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub channel: BookingChannel,
    pub payment: PaymentInfo,
    pub total_sessions: i32,
    pub sessions_paid: i32,
    pub sessions_completed: i32,
    pub reminders_sent: i32,
    pub last_reminder_sent: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Append-only by convention; reschedule and cancellation reasons are
    /// concatenated, never overwritten.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}\n{}", existing, note),
            None => note.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingAssignment,
    Scheduled,
    Confirmed,
    Rescheduled,
    Completed,
    Cancelled,
    NoShow,
    Converted,
}

impl AppointmentStatus {
    /// Active appointments participate in conflict checks; terminal ones are
    /// invisible to the checker and to automated processes.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
                | AppointmentStatus::Completed
                | AppointmentStatus::Converted
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::PendingAssignment => write!(f, "pending_assignment"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Converted => write!(f, "converted"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[serde(alias = "initial", alias = "assessment")]
    InitialAssessment,
    #[serde(alias = "followup")]
    FollowUp,
    #[serde(alias = "therapy")]
    TherapySession,
    #[serde(alias = "group", alias = "other")]
    GroupSession,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InitialAssessment => write!(f, "initial_assessment"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::TherapySession => write!(f, "therapy_session"),
            AppointmentType::GroupSession => write!(f, "group_session"),
        }
    }
}

/// How the booking entered the system. Channel-specific required fields are
/// validated at the boundary, not encoded as optional-field duck typing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingChannel {
    Staff,
    Public,
    RequestConversion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub amount: f64,
    pub method: Option<String>,
    pub status: PaymentStatus,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            amount: 0.0,
            method: None,
            status: PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartiallyPaid,
    Refunded,
}

// ==============================================================================
// APPOINTMENT REQUEST FORM (PRE-APPOINTMENT INTAKE)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentForm {
    pub id: Uuid,
    pub parent_name: String,
    pub child_name: String,
    pub child_age: Option<i32>,
    pub phone: String,
    pub email: Option<String>,
    pub service_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<String>,
    pub consent: bool,
    pub notes: Option<String>,
    pub status: FormStatus,
    /// Set when the form is converted into a formal appointment.
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Pending,
    Converted,
    Cancelled,
}

// ==============================================================================
// DIRECTORY RECORDS (READ-MOSTLY COLLABORATORS)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistRecord {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: Uuid,
    pub name: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_name: String,
    /// Parent/guardian name, used when the guardian record has to be created.
    pub guardian_name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub patient_id: Option<Uuid>,
    pub guardian_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub channel: Option<BookingChannel>,
    pub consent: Option<bool>,
    pub total_sessions: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub therapist_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTherapistRequest {
    pub therapist_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAppointmentFormRequest {
    pub parent_name: String,
    pub child_name: String,
    pub child_age: Option<i32>,
    pub phone: String,
    pub email: Option<String>,
    pub service_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<String>,
    pub consent: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertFormRequest {
    pub therapist_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    pub total_sessions: Option<i32>,
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictingSlot {
    pub appointment_id: Uuid,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
}

// ==============================================================================
// CALENDAR VIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarView {
    pub date: NaiveDate,
    pub therapists: Vec<TherapistDaySchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistDaySchedule {
    pub therapist_id: Uuid,
    pub therapist_name: String,
    /// Fixed 14-slot grid, in canonical slot order.
    pub slots: Vec<CalendarSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSlot {
    pub label: String,
    pub appointment: Option<SlotSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSummary {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub phone: String,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Therapist already has an appointment at this time ({start} - {end}, {status})")]
    Conflict {
        start: String,
        end: String,
        status: AppointmentStatus,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<MalformedTimeError> for SchedulingError {
    fn from(e: MalformedTimeError) -> Self {
        SchedulingError::Validation(e.to_string())
    }
}
