//! Bodega CLI - Database migrations and ledger operations.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bodega migrate
//!
//! # Record a new pedido from a JSON file of lines
//! bodega ingest pedido.json
//!
//! # Change quantities/costs of a pedido's entries
//! bodega edit 6f1c...e2 changes.json
//!
//! # Reverse a pedido and remove it from the ledger
//! bodega delete 6f1c...e2
//!
//! # Show the most recent pedidos
//! bodega history --limit 20
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `ingest` / `edit` / `delete` - Engine operations against `PostgreSQL`
//! - `history` - Grouped ledger history

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bodega_core::PedidoId;

mod commands;

#[derive(Parser)]
#[command(name = "bodega")]
#[command(author, version, about = "Bodega inventory ledger tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Record a new pedido
    Ingest {
        /// JSON array of `{product_id, color_key, quantity}` lines
        file: PathBuf,
    },
    /// Edit the entries of a pedido
    Edit {
        /// Pedido to edit
        pedido: PedidoId,

        /// JSON array of `{entry_id, quantity, cost?}` changes
        file: PathBuf,
    },
    /// Reverse a pedido's stock and remove its entries
    Delete {
        /// Pedido to delete
        pedido: PedidoId,
    },
    /// Show grouped ledger history, newest first
    History {
        /// Maximum number of pedidos to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bodega_admin=info,bodega=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Ingest { file } => commands::ledger::ingest(&file).await,
        Commands::Edit { pedido, file } => commands::ledger::edit(pedido, &file).await,
        Commands::Delete { pedido } => commands::ledger::delete(pedido).await,
        Commands::History { limit } => commands::ledger::history(limit).await,
    }
}
