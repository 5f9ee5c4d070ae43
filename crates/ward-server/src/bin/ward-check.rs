//! Connectivity check for the configured database.
//!
//! Loads the same configuration as `ward-server`, opens the pool, runs a
//! trivial statement and reports whether the patients table exists. Exits
//! non-zero if the database cannot be reached.

use std::process::ExitCode;
use ward_db::{PatientStore, SqliteStore};
use ward_server::config;

fn main() -> ExitCode {
    let (resolved_config_path, _) = config::resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ward-check: {e}");
            return ExitCode::FAILURE;
        }
    };

    ward_server::init_tracing(&config.logging);

    let pool = match ward_db::create_pool(&config.database.path, config.database.runtime_settings())
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(path = %config.database.path, error = %e, "error connecting to the database");
            return ExitCode::FAILURE;
        }
    };
    let store = SqliteStore::new(pool);

    if let Err(e) = store.ping() {
        tracing::error!(path = %config.database.path, error = %e, "database did not answer");
        return ExitCode::FAILURE;
    }

    match store.table_exists() {
        Ok(exists) => tracing::info!(
            path = %config.database.path,
            patients_table = exists,
            "connected to the database"
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to inspect schema");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
