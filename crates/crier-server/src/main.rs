//! Crier server binary — the entry point for the voice session engine.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, queue recovery, and graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use crier_server::{app, config, AppState};
use crier_synth::{HttpSynthesizer, SynthesisClient};
use crier_voice::{LogNotifier, NullTransport, SessionManager};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("CRIER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = crier_db::create_pool(
        &config.database.path,
        crier_db::DbSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = crier_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }

        // Items caught mid-playback by the last shutdown go back to pending.
        // Each channel's backlog is loaded when its session is next joined.
        let recovered =
            crier_queue::recover_pending(&conn).expect("failed to recover the speech queue");
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "recovered pending speech requests");
        }
    }

    // Build the synthesis client
    let backend = HttpSynthesizer::new(
        config.synthesis.endpoint.clone(),
        config.synthesis.api_key.clone(),
        config.synthesis.call_timeout(),
    )
    .expect("failed to build synthesis client — check [synthesis] in config");
    let synth = SynthesisClient::new(Arc::new(backend), config.synthesis.retry_policy());

    // Build the session manager. The null transport stands in until a chat
    // platform's voice layer is wired in through the Transport trait.
    let manager = Arc::new(SessionManager::new(
        pool.clone(),
        synth,
        Arc::new(NullTransport),
        Arc::new(LogNotifier),
        config.engine.to_engine_config(),
    ));

    // Build application
    let app = app(AppState {
        pool,
        manager: manager.clone(),
    });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting crier server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The HTTP surface is down; let every live session finish its current
    // item before the process exits.
    manager.shutdown().await;

    tracing::info!("crier server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
