// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    let protected_routes = Router::new()
        // Core appointment lifecycle
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/assign-therapist", patch(handlers::assign_therapist))
        // Intake request workflow (staff side)
        .route("/requests/{form_id}/convert", post(handlers::convert_appointment_request))
        .route("/requests/{form_id}/cancel", post(handlers::cancel_appointment_request))
        // Utility endpoints
        .route("/calendar", get(handlers::calendar_view))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    // Parent-facing intake is unauthenticated.
    let public_routes = Router::new().route("/requests", post(handlers::submit_appointment_request));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}
