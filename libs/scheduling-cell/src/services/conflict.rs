// libs/scheduling-cell/src/services/conflict.rs
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ConflictingSlot, SchedulingError};
use crate::repository::AppointmentRepository;
use crate::services::timeslot;

/// Advisory locks keyed by (therapist, date). Every conflict-sensitive write
/// acquires the key's lock before running check-then-write, closing the race
/// where two concurrent bookings for the same therapist both pass the check.
/// In-process only: the deployment runs a single API process.
pub struct SlotLockRegistry {
    locks: Mutex<HashMap<(Uuid, NaiveDate), Arc<Mutex<()>>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, therapist_id: Uuid, date: NaiveDate) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Guards and waiters each hold a clone of their entry's Arc, so a
            // strong count of one means the entry is released; sweeping here
            // keeps the map from growing by one key per (therapist, date).
            locks.retain(|_, entry| Arc::strong_count(entry) > 1);
            Arc::clone(
                locks
                    .entry((therapist_id, date))
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

impl Default for SlotLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConflictDetectionService {
    appointments: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>) -> Self {
        Self { appointments }
    }

    /// Returns the first active appointment for `therapist_id` on `date` whose
    /// interval overlaps [start_time, end_time), or None. Appointments still
    /// awaiting therapist assignment have nothing to conflict against and are
    /// never reported.
    pub async fn find_conflict(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<ConflictingSlot>, SchedulingError> {
        debug!(
            "Checking conflicts for therapist {} on {} ({} - {})",
            therapist_id, date, start_time, end_time
        );

        let existing = self
            .appointments
            .find_for_therapist_on(therapist_id, date)
            .await?;

        for appointment in existing {
            if Some(appointment.id) == exclude_id {
                continue;
            }
            if !appointment.status.is_active() {
                continue;
            }

            // Stored rows with unparseable times cannot be compared; skip them
            // rather than blocking every booking for the day.
            let overlap = match timeslot::overlaps(
                start_time,
                end_time,
                &appointment.start_time,
                &appointment.end_time,
            ) {
                Ok(overlap) => overlap,
                Err(e) => {
                    warn!("Skipping appointment {} in conflict check: {}", appointment.id, e);
                    continue;
                }
            };

            if overlap {
                warn!(
                    "Conflict detected for therapist {} on {}: {} - {} ({})",
                    therapist_id, date, appointment.start_time, appointment.end_time,
                    appointment.status
                );
                return Ok(Some(ConflictingSlot {
                    appointment_id: appointment.id,
                    start_time: appointment.start_time,
                    end_time: appointment.end_time,
                    status: appointment.status,
                }));
            }
        }

        Ok(None)
    }

    /// Error form of [`find_conflict`] used by the write paths.
    pub async fn ensure_free(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        match self
            .find_conflict(therapist_id, date, start_time, end_time, exclude_id)
            .await?
        {
            Some(slot) => Err(SchedulingError::Conflict {
                start: slot.start_time,
                end: slot.end_time,
                status: slot.status,
            }),
            None => Ok(()),
        }
    }
}
