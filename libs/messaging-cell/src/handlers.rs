// libs/messaging-cell/src/handlers.rs
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::models::{MessagingError, VerifyParams, WebhookPayload};
use crate::services::reconciler::ReplyReconciler;
use crate::MessagingState;

/// GET /webhooks/whatsapp. Provider-side verification handshake: echo the
/// challenge back when the token matches, 403 otherwise.
#[axum::debug_handler]
pub async fn verify_webhook(
    State(state): State<Arc<MessagingState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.config.whatsapp_verify_token.as_str());

    if mode_ok && token_ok {
        info!("Webhook verification succeeded");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("Webhook verification rejected");
        (StatusCode::FORBIDDEN, "Forbidden".to_string())
    }
}

/// POST /webhooks/whatsapp. Always acks with 200 once the payload parses;
/// the provider retries on anything else and we would rather drop a
/// malformed reply than be redelivered forever. 500 is reserved for
/// genuine internal failures surfaced by the reconciler.
#[axum::debug_handler]
pub async fn receive_webhook(
    State(state): State<Arc<MessagingState>>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    debug!(
        "Inbound webhook: {} entries",
        payload.entry.len()
    );

    let reconciler = ReplyReconciler::new(state.appointments.clone(), state.clock.clone());
    match reconciler.process_payload(&payload).await {
        Ok(outcomes) => {
            info!("Webhook processed: {} message(s) handled", outcomes.len());
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(MessagingError::Database(msg)) => {
            error!("Webhook processing hit a storage failure: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
        }
        Err(e) => {
            // Business-level failures are acked so the provider stops
            // redelivering the same payload.
            warn!("Webhook processed with non-fatal error: {}", e);
            (StatusCode::OK, Json(json!({ "success": true })))
        }
    }
}
