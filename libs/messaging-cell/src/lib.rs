pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::clock::Clock;

use scheduling_cell::repository::AppointmentRepository;

/// Shared state for the webhook/reminder cell.
pub struct MessagingState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub clock: Arc<dyn Clock>,
}

impl MessagingState {
    pub fn new(
        config: Arc<AppConfig>,
        appointments: Arc<dyn AppointmentRepository>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            appointments,
            clock,
        })
    }
}
