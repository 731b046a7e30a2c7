// libs/messaging-cell/src/services/reminder.rs
//
// Daily reminder job for tomorrow's scheduled appointments. Owned by the
// composition root; each tick is idempotent per clinic-local calendar day.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_utils::clock::{clinic_offset, Clock};
use shared_utils::phone::with_country_code;

use scheduling_cell::repository::{AppointmentRepository, DirectoryRepository};

use crate::models::{MessagingError, ReminderMessage};
use crate::services::whatsapp::MessageSender;

pub struct ReminderDispatcher {
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn DirectoryRepository>,
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn Clock>,
    utc_offset_minutes: i32,
    reminder_hour: u32,
    country_code: String,
}

impl ReminderDispatcher {
    pub fn new(
        config: &AppConfig,
        appointments: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn DirectoryRepository>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            appointments,
            directory,
            sender,
            clock,
            utc_offset_minutes: config.clinic_utc_offset_minutes,
            reminder_hour: config.reminder_hour,
            country_code: config.default_country_code.clone(),
        }
    }

    /// One dispatcher tick. Returns the number of reminders actually sent.
    ///
    /// Re-running within the same clinic-local day is a no-op for every
    /// appointment already reminded today: the counter increment and the
    /// `last_reminder_sent` stamp commit as one repository write, so an
    /// overlapping run re-reads the stamp and skips.
    pub async fn run_once(&self) -> Result<u32, MessagingError> {
        let offset = clinic_offset(self.utc_offset_minutes);
        let today = self.clock.now_in(offset).date_naive();
        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| MessagingError::Database("date overflow".to_string()))?;

        let due = self.appointments.find_scheduled_on(tomorrow).await?;
        info!("Reminder tick: {} scheduled appointments on {}", due.len(), tomorrow);

        let mut sent = 0u32;
        for appointment in due {
            if let Some(last) = appointment.last_reminder_sent {
                if last.with_timezone(&offset).date_naive() == today {
                    debug!("Appointment {} already reminded today, skipping", appointment.id);
                    continue;
                }
            }

            let service_name = self
                .directory
                .get_service(appointment.service_id)
                .await
                .ok()
                .flatten()
                .map(|s| s.name)
                .unwrap_or_else(|| "therapy session".to_string());

            let message = ReminderMessage {
                service_name,
                formatted_date: appointment.date.format("%d %b %Y").to_string(),
                start_time: appointment.start_time.clone(),
            };
            let to_phone = with_country_code(&appointment.phone, &self.country_code);

            // One appointment failing must not starve the rest of the batch.
            match self.sender.send_reminder(&to_phone, &message).await {
                Ok(()) => {
                    if let Err(e) = self
                        .appointments
                        .record_reminder_sent(appointment.id, self.clock.now_utc())
                        .await
                    {
                        error!(
                            "Reminder sent for {} but bookkeeping failed: {}",
                            appointment.id, e
                        );
                        continue;
                    }
                    sent += 1;
                }
                Err(e) => {
                    warn!("Reminder send failed for {}: {}", appointment.id, e);
                }
            }
        }

        info!("Reminder tick complete: {} sent", sent);
        Ok(sent)
    }

    /// Spawn the daily loop, firing at the configured clinic-local hour.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Reminder dispatcher started (daily at {:02}:00, UTC{:+})",
                self.reminder_hour,
                self.utc_offset_minutes as f64 / 60.0
            );
            loop {
                let wait = self.until_next_run();
                debug!("Reminder dispatcher sleeping for {:?}", wait);
                tokio::time::sleep(wait).await;

                if let Err(e) = self.run_once().await {
                    error!("Reminder tick failed: {}", e);
                }
            }
        })
    }

    fn until_next_run(&self) -> std::time::Duration {
        let offset = clinic_offset(self.utc_offset_minutes);
        let now_local = self.clock.now_in(offset).naive_local();

        let today_run = now_local
            .date()
            .and_hms_opt(self.reminder_hour.min(23), 0, 0)
            .unwrap_or(now_local);
        let next_run = if now_local < today_run {
            today_run
        } else {
            today_run + ChronoDuration::days(1)
        };

        (next_run - now_local)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}
