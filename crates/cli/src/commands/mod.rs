//! CLI command implementations.

pub mod ledger;
pub mod migrate;

use std::sync::Arc;

use thiserror::Error;

use bodega_admin::config::{AdminConfig, ConfigError};
use bodega_admin::db::{self, LedgerRepository, ProductRepository, RepositoryError};
use bodega_admin::services::inventory::{InventoryEngine, OperationError, StoreError};
use bodega_admin::services::ledger_api::{LedgerApiClient, LedgerApiError};

/// Errors surfaced by any command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("could not read {path}: {source}")]
    Input {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid input in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("ledger API client error: {0}")]
    LedgerApi(#[from] LedgerApiError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("{0}")]
    Invalid(String),
}

/// Connect to the database and build an engine over it.
///
/// The privileged deletion strategy is enabled when the ledger API is
/// configured.
pub async fn connect() -> Result<(InventoryEngine, LedgerRepository), CommandError> {
    let config = AdminConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    let ledger = LedgerRepository::new(pool.clone());
    let mut engine = InventoryEngine::new(
        Arc::new(ProductRepository::new(pool)),
        Arc::new(ledger.clone()),
        config.cache_ttl,
    );

    match config.ledger_api() {
        Some(api) => {
            tracing::info!(url = %api.base_url, "Privileged deletion enabled");
            engine = engine.with_privileged_ledger(Arc::new(LedgerApiClient::new(&api)?));
        }
        None => tracing::info!("Ledger API not configured, privileged deletion disabled"),
    }

    Ok((engine, ledger))
}
