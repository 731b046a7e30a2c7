// libs/messaging-cell/src/services/reconciler.rs
//
// Turns inbound WhatsApp replies back into appointment state. A "YES"
// confirms the sender's most recent scheduled appointment, a "NO" cancels
// it; everything else is ignored.

use std::sync::Arc;
use tracing::{debug, info, warn};

use shared_utils::clock::Clock;
use shared_utils::phone::canonical_phone;

use scheduling_cell::models::AppointmentStatus;
use scheduling_cell::repository::AppointmentRepository;

use crate::models::{InboundMessage, MessagingError, WebhookPayload};

/// What a reply meant for the matched appointment, reported per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Confirmed,
    Cancelled,
    Ignored,
    NoMatch,
}

pub struct ReplyReconciler {
    appointments: Arc<dyn AppointmentRepository>,
    clock: Arc<dyn Clock>,
}

impl ReplyReconciler {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            appointments,
            clock,
        }
    }

    /// Walk every message in the provider payload. A failure on one message
    /// is logged and does not stop the rest; if any message hit an internal
    /// error the first one is returned after the batch completes so the
    /// caller can report it.
    pub async fn process_payload(
        &self,
        payload: &WebhookPayload,
    ) -> Result<Vec<ReplyOutcome>, MessagingError> {
        let mut outcomes = Vec::new();
        let mut first_error = None;
        for entry in &payload.entry {
            for change in &entry.changes {
                for message in &change.value.messages {
                    match self.process_message(message).await {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(e) => {
                            warn!("Failed to reconcile reply from {}: {}", message.from, e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    /// Reconcile a single inbound reply against the sender's latest
    /// scheduled appointment.
    ///
    /// Only `scheduled` appointments are eligible, so a duplicate "YES"
    /// finds nothing on the second delivery and lands on `NoMatch` instead
    /// of erroring. Replies that are neither an affirmation nor a refusal
    /// are dropped without touching the store.
    pub async fn process_message(
        &self,
        message: &InboundMessage,
    ) -> Result<ReplyOutcome, MessagingError> {
        let body = match message.reply_body() {
            Some(body) => body.trim(),
            None => {
                debug!("Unsupported message type '{}', ignoring", message.message_type);
                return Ok(ReplyOutcome::Ignored);
            }
        };

        let target_status = match interpret_reply(body) {
            Some(status) => status,
            None => {
                debug!("Unrecognized reply '{}', ignoring", body);
                return Ok(ReplyOutcome::Ignored);
            }
        };

        let phone = canonical_phone(&message.from);
        let appointment = match self
            .appointments
            .find_latest_scheduled_by_phone(&phone)
            .await?
        {
            Some(appointment) => appointment,
            None => {
                info!("Reply from {} matched no scheduled appointment", phone);
                return Ok(ReplyOutcome::NoMatch);
            }
        };

        let mut updated = appointment;
        updated.status = target_status;
        updated.updated_at = self.clock.now_utc();
        let outcome = match target_status {
            AppointmentStatus::Cancelled => {
                updated.cancelled_at = Some(self.clock.now_utc());
                ReplyOutcome::Cancelled
            }
            _ => ReplyOutcome::Confirmed,
        };
        self.appointments.update(&updated).await?;

        info!(
            "Appointment {} marked {} from WhatsApp reply",
            updated.id, updated.status
        );
        Ok(outcome)
    }
}

/// Case-insensitive reply interpretation. Affirmations confirm, refusals
/// cancel, anything else is left to a human.
fn interpret_reply(body: &str) -> Option<AppointmentStatus> {
    match body.to_lowercase().as_str() {
        "yes" | "confirm" => Some(AppointmentStatus::Confirmed),
        "no" | "cancel" => Some(AppointmentStatus::Cancelled),
        _ => None,
    }
}
