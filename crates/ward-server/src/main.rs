//! Ward server binary: HTTP gateway for the patients table.
//!
//! Starts an axum HTTP server with structured logging, database pool
//! initialization, a first schema check, and graceful shutdown on
//! SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use ward_db::{PatientStore, SchemaError, SqliteStore};
use ward_server::{app, config, AppState};

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = config::resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; the server cannot start without valid config");

    ward_server::init_tracing(&config.logging);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = ward_db::create_pool(&config.database.path, config.database.runtime_settings())
        .expect("failed to create database pool; check database.path in config");
    let store: Arc<dyn PatientStore> = Arc::new(SqliteStore::new(pool));

    let state = AppState {
        store,
        schema: Arc::new(ward_db::SchemaGuard::new(config.database.schema_policy)),
        messages: Arc::new(config.messages.clone()),
        limits: config.server.limits(),
    };

    // A failure here is not fatal: the guard runs again per request.
    {
        let state = state.clone();
        let policy = state.schema.policy();
        let outcome =
            tokio::task::spawn_blocking(move || state.schema.check(state.store.as_ref())).await;
        match outcome {
            Ok(Ok(())) => tracing::info!(policy = policy.as_str(), "patients table ready"),
            Ok(Err(SchemaError::Missing)) => tracing::warn!(
                policy = policy.as_str(),
                "patients table does not exist; requests will be refused until it is created"
            ),
            Ok(Err(SchemaError::Setup(e))) => {
                tracing::error!(error = %e, "initial patients table bootstrap failed")
            }
            Err(e) => tracing::error!(error = %e, "initial schema check panicked"),
        }
    }

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting ward server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("ward server shut down");
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
