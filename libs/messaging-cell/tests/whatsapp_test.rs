use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::models::{MessagingError, ReminderMessage};
use messaging_cell::services::whatsapp::{MessageSender, WhatsAppClient};
use shared_utils::test_utils::TestConfig;

fn reminder() -> ReminderMessage {
    ReminderMessage {
        service_name: "Speech Therapy".to_string(),
        formatted_date: "10 Jan 2024".to_string(),
        start_time: "09:15 AM".to_string(),
    }
}

#[tokio::test]
async fn test_send_reminder_posts_to_provider() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.whatsapp_api_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .and(header("Authorization", "Bearer test-whatsapp-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "917993724192",
            "type": "text"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "wamid.test" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = WhatsAppClient::new(&config).unwrap();
    client
        .send_reminder("917993724192", &reminder())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_provider_error_surfaces_as_send_failure() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.whatsapp_api_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "invalid token" }
        })))
        .mount(&mock_server)
        .await;

    let client = WhatsAppClient::new(&config).unwrap();
    let err = client
        .send_reminder("917993724192", &reminder())
        .await
        .unwrap_err();
    assert_matches!(err, MessagingError::SendFailed(_));
}

#[tokio::test]
async fn test_client_requires_configuration() {
    let mut config = TestConfig::default().to_app_config();
    config.whatsapp_access_token = String::new();

    let err = WhatsAppClient::new(&config).unwrap_err();
    assert_matches!(err, MessagingError::NotConfigured);
}
