//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bodega migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BODEGA_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations live in `crates/admin/migrations/`.

use bodega_admin::config::AdminConfig;
use bodega_admin::db;

use super::CommandError;

/// Run the ledger database migrations.
pub async fn run() -> Result<(), CommandError> {
    let config = AdminConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../admin/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
