// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::clock::clinic_offset;

use crate::models::{
    AssignTherapistRequest, ConvertFormRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest, SchedulingError, SubmitAppointmentFormRequest,
    UpdateStatusRequest,
};
use crate::services::booking::SchedulingService;
use crate::services::calendar::CalendarService;
use crate::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CalendarQueryParams {
    pub date: Option<NaiveDate>,
    pub therapist_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckParams {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub exclude_id: Option<Uuid>,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        SchedulingError::Validation(msg) => AppError::ValidationError(msg),
        e @ SchedulingError::Conflict { .. } => AppError::Conflict(e.to_string()),
        SchedulingError::Forbidden(msg) => AppError::Forbidden(msg),
        e @ SchedulingError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
        SchedulingError::Database(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff_admin() {
        return Err(AppError::Forbidden(
            "only admin or receptionist may create appointments".to_string(),
        ));
    }

    let service = SchedulingService::new(&state);
    let appointment = service
        .create_appointment(request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(_user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SchedulingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff_admin() {
        return Err(AppError::Forbidden(
            "only admin or receptionist may reschedule appointments".to_string(),
        ));
    }

    let service = SchedulingService::new(&state);
    let appointment = service
        .reschedule(appointment_id, request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SchedulingService::new(&state);
    let appointment = service
        .update_status(appointment_id, request.status, &user)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn assign_therapist(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AssignTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SchedulingService::new(&state);
    let appointment = service
        .assign_therapist(appointment_id, request, &user)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn calendar_view(
    State(state): State<Arc<SchedulingState>>,
    Extension(_user): Extension<User>,
    Query(params): Query<CalendarQueryParams>,
) -> Result<Json<Value>, AppError> {
    // Default to "today" in clinic-local time, not server time.
    let date = params.date.unwrap_or_else(|| {
        state
            .clock
            .now_in(clinic_offset(state.config.clinic_utc_offset_minutes))
            .date_naive()
    });

    let service = CalendarService::new(&state);
    let view = service
        .day_view(date, params.therapist_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "calendar": view })))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<SchedulingState>>,
    Extension(_user): Extension<User>,
    Query(params): Query<ConflictCheckParams>,
) -> Result<Json<Value>, AppError> {
    let service = SchedulingService::new(&state);
    let conflict = service
        .check_conflict(
            params.therapist_id,
            params.date,
            &params.start_time,
            &params.end_time,
            params.exclude_id,
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "has_conflict": conflict.is_some(),
        "conflicting_slot": conflict
    })))
}

// ==============================================================================
// APPOINTMENT REQUEST (INTAKE FORM) HANDLERS
// ==============================================================================

/// Public intake: parents submit a request before a therapist or exact slot
/// exists. No authentication.
#[axum::debug_handler]
pub async fn submit_appointment_request(
    State(state): State<Arc<SchedulingState>>,
    Json(request): Json<SubmitAppointmentFormRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SchedulingService::new(&state);
    let form = service
        .submit_form(request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "request": form
    })))
}

#[axum::debug_handler]
pub async fn convert_appointment_request(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(form_id): Path<Uuid>,
    Json(request): Json<ConvertFormRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff_admin() {
        return Err(AppError::Forbidden(
            "only admin or receptionist may convert appointment requests".to_string(),
        ));
    }

    let service = SchedulingService::new(&state);
    let appointment = service
        .convert_form(form_id, request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment_request(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff_admin() {
        return Err(AppError::Forbidden(
            "only admin or receptionist may cancel appointment requests".to_string(),
        ));
    }

    let service = SchedulingService::new(&state);
    let form = service
        .cancel_form(form_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "request": form
    })))
}
