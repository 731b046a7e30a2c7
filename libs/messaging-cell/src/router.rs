// libs/messaging-cell/src/router.rs
use axum::{routing::get, Router};
use std::sync::Arc;

use crate::handlers;
use crate::MessagingState;

/// Webhook routes are public by design: the provider authenticates via the
/// verify-token handshake, not a bearer token.
pub fn messaging_router(state: Arc<MessagingState>) -> Router {
    Router::new()
        .route(
            "/whatsapp",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .with_state(state)
}
