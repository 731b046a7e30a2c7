// libs/messaging-cell/src/models.rs
use serde::{Deserialize, Serialize};

// ==============================================================================
// INBOUND WEBHOOK PAYLOAD (WhatsApp Cloud API shape)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChange {
    pub value: WebhookChangeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender id as delivered by the provider: country-code-prefixed digits.
    pub from: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub button: Option<ButtonReply>,
}

impl InboundMessage {
    /// The reply content, whether it arrived as free text or a button tap.
    pub fn reply_body(&self) -> Option<&str> {
        match self.message_type.as_str() {
            "button" => self.button.as_ref().map(|b| b.payload.as_str()),
            "text" => self.text.as_ref().map(|t| t.body.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonReply {
    pub payload: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// GET-side webhook verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

// ==============================================================================
// OUTBOUND REMINDER
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ReminderMessage {
    pub service_name: String,
    pub formatted_date: String,
    pub start_time: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Messaging not configured")]
    NotConfigured,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<scheduling_cell::models::SchedulingError> for MessagingError {
    fn from(e: scheduling_cell::models::SchedulingError) -> Self {
        MessagingError::Database(e.to_string())
    }
}
