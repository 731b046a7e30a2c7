pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::repository::supabase::{SupabaseDirectoryRepository, SupabaseSchedulingRepository};
use crate::repository::{AppointmentRepository, DirectoryRepository};
use crate::services::conflict::SlotLockRegistry;

/// Shared state for the scheduling cell. Handlers construct their services per
/// request from these parts; the slot-lock registry and repositories are
/// process-wide.
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub clock: Arc<dyn Clock>,
    pub slot_locks: Arc<SlotLockRegistry>,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>) -> Arc<Self> {
        let supabase = Arc::new(SupabaseClient::new(&config));
        Self::with_parts(
            config,
            Arc::new(SupabaseSchedulingRepository::new(Arc::clone(&supabase))),
            Arc::new(SupabaseDirectoryRepository::new(supabase)),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: Arc<AppConfig>,
        appointments: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn DirectoryRepository>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            appointments,
            directory,
            clock,
            slot_locks: Arc::new(SlotLockRegistry::new()),
        })
    }
}
