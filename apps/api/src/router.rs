use std::sync::Arc;

use axum::{routing::get, Router};

use messaging_cell::router::messaging_router;
use messaging_cell::MessagingState;
use scheduling_cell::router::appointment_routes;
use scheduling_cell::SchedulingState;

pub fn create_router(
    scheduling: Arc<SchedulingState>,
    messaging: Arc<MessagingState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(scheduling))
        .nest("/webhooks", messaging_router(messaging))
}
