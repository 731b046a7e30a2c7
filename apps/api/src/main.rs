use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use messaging_cell::services::reminder::ReminderDispatcher;
use messaging_cell::services::whatsapp::WhatsAppClient;
use messaging_cell::MessagingState;
use scheduling_cell::SchedulingState;
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Scheduling and messaging share one appointment store.
    let scheduling = SchedulingState::new(config.clone());
    let messaging = MessagingState::new(
        config.clone(),
        scheduling.appointments.clone(),
        scheduling.clock.clone(),
    );

    // Background reminder loop; skipped when WhatsApp is not configured so
    // local development works without provider credentials.
    match WhatsAppClient::new(&config) {
        Ok(sender) => {
            let dispatcher = Arc::new(ReminderDispatcher::new(
                &config,
                scheduling.appointments.clone(),
                scheduling.directory.clone(),
                Arc::new(sender),
                scheduling.clock.clone(),
            ));
            dispatcher.start();
        }
        Err(e) => {
            warn!("Reminder dispatcher disabled: {}", e);
        }
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(scheduling, messaging)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
