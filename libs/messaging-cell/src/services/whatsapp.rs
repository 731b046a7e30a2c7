// libs/messaging-cell/src/services/whatsapp.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{MessagingError, ReminderMessage};

/// Abstract outbound channel. The scheduling core only knows "deliver a
/// reminder for appointment X"; delivery details live behind this trait.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_reminder(
        &self,
        to_phone: &str,
        message: &ReminderMessage,
    ) -> Result<(), MessagingError>;
}

/// WhatsApp Cloud API client.
#[derive(Debug)]
pub struct WhatsAppClient {
    client: Client,
    api_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsAppClient {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        if !config.is_messaging_configured() {
            return Err(MessagingError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_url: config.whatsapp_api_url.clone(),
            access_token: config.whatsapp_access_token.clone(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
        })
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send_reminder(
        &self,
        to_phone: &str,
        message: &ReminderMessage,
    ) -> Result<(), MessagingError> {
        let url = format!("{}/{}/messages", self.api_url, self.phone_number_id);

        let body = json!({
            "messaging_product": "whatsapp",
            "to": to_phone,
            "type": "text",
            "text": {
                "body": format!(
                    "Reminder: {} appointment on {} at {}. Reply YES to confirm or NO to cancel.",
                    message.service_name, message.formatted_date, message.start_time
                )
            }
        });

        debug!("Sending reminder to {} via {}", to_phone, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| MessagingError::SendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("WhatsApp send failed: {} - {}", status, response_text);
            return Err(MessagingError::SendFailed(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        info!("Reminder delivered to {}", to_phone);
        Ok(())
    }
}
