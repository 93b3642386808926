//! # Interview Coach Backend - Main Application Entry Point
//!
//! Actix-web server for AI mock interviews:
//!
//! ## Application Architecture:
//! - **config**: Configuration layering (defaults, config.toml, environment)
//! - **state**: Shared state: metrics, setup store, session registry, signaling
//! - **signaling**: Offer/answer handling and the per-session task
//! - **pipeline**: Ordered stage chain each session runs (framing → recognition →
//!   aggregation → interview logic → language model → transcripts → synthesis → output)
//! - **interview / context / summary**: Question pool, conversation history, evaluation
//! - **transport**: Peer connection seam plus the local WebSocket media bridge
//! - **handlers / websocket / health**: HTTP and WebSocket surface
//! - **middleware**: Request logging and metrics
//!
//! ## Startup:
//! 1. Load `.env`, initialise tracing
//! 2. Load and validate configuration
//! 3. Build the language model client and the shared state
//! 4. Serve until SIGINT/SIGTERM, then cancel live sessions and stop gracefully

mod config;
mod context;
mod error;
mod handlers;
mod health;
mod interview;
mod llm;
mod middleware;
mod pipeline;
mod services;
mod session;
mod setup;
mod signaling;
mod state;
mod summary;
mod text_interview;
mod transport;
mod turn_buffer;
mod websocket;

use crate::config::AppConfig;
use crate::llm::AzureOpenAiClient;
use crate::services::Collaborators;
use crate::state::AppState;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting interview-coach-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    if !config.llm_configured() {
        warn!("Azure OpenAI settings are incomplete; model calls will fail until they are set");
    }

    let model = AzureOpenAiClient::new(&config.llm)?;
    let app_state = AppState::new(config.clone(), Collaborators::text_only(Arc::new(model)));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let state = app_state.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config)),
            )
            .service(
                web::scope("/api")
                    .route("/setup", web::post().to(handlers::post_setup))
                    .route("/setup", web::get().to(handlers::get_setup))
                    .route("/offer", web::post().to(handlers::post_offer))
                    .route("/offer", web::patch().to(handlers::patch_offer))
                    .route("/sessions", web::get().to(handlers::list_sessions))
                    .route("/sessions/{pc_id}", web::delete().to(handlers::terminate_session)),
            )
            .route("/ws/media/{pc_id}", web::get().to(websocket::media_websocket))
            .route("/ws/interview", web::get().to(websocket::interview_websocket))
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            let cancelled = app_state.registry.cancel_all();
            info!(cancelled, "Shutdown signal received, live sessions cancelled");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging filtered by `RUST_LOG`.
///
/// Defaults to `interview_coach_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_coach_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Flip [`SHUTDOWN_SIGNAL`] on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll [`SHUTDOWN_SIGNAL`] every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
