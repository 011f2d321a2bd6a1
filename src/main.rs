// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use mocktest_session::backend::HttpBackend;
use mocktest_session::config::{Config, SWEEP_INTERVAL};
use mocktest_session::routes;
use mocktest_session::session::registry::SessionRegistry;
use mocktest_session::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let backend = match HttpBackend::new(&config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to build backend client: {}", e);
            return;
        }
    };
    tracing::info!("Using backend at {}", config.api_base_url);

    let sessions = SessionRegistry::new();
    let _sweeper = sessions.spawn_sweeper(SWEEP_INTERVAL, config.session_idle_ttl());

    // Create AppState
    let state = AppState {
        config: config.clone(),
        backend: Arc::new(backend),
        sessions,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            return;
        }
    };
    tracing::info!("Listening on {}", config.bind_addr);

    // Start the server
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
