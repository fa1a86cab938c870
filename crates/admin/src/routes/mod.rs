//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                - Liveness
//! GET   /health/ready          - Readiness (database ping)
//!
//! # Ledger (bearer key)
//! POST  /api/ledger/delete     - Privileged deletion of a pedido's rows
//! PATCH /api/ledger/entries    - Batched quantity/cost update
//!
//! # History
//! GET   /api/pedidos           - Grouped ledger history, newest first
//! GET   /api/pedidos/{id}      - One pedido
//! ```

pub mod health;
pub mod ledger;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::services::ledger_api::{DELETE_PATH, UPDATE_PATH};
use crate::state::AppState;

/// Build the router with every route.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route(DELETE_PATH, post(ledger::delete_entries))
        .route(UPDATE_PATH, patch(ledger::update_entries))
        .route("/api/pedidos", get(ledger::list_pedidos))
        .route("/api/pedidos/{id}", get(ledger::show_pedido))
}
