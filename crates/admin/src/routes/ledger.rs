//! Ledger endpoint handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use bodega_core::PedidoId;

use crate::{
    error::AppError,
    middleware::RequireLedgerKey,
    models::ledger::LedgerEntryUpdate,
    services::inventory::{LedgerSummary, Pedido},
    services::ledger_api::{
        BatchUpdateRequest, BatchUpdateResponse, DeleteEntriesRequest, DeleteEntriesResponse,
    },
    state::AppState,
};

/// Default number of pedidos returned by the history endpoint.
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Body of the history endpoint.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub pedidos: Vec<Pedido>,
    pub summary: LedgerSummary,
}

/// Hard-delete rows of one pedido, bypassing the regular store path.
#[instrument(skip(state, _key, body), fields(pedido_id = %body.pedido_id, entries = body.entry_ids.len()))]
pub async fn delete_entries(
    State(state): State<AppState>,
    _key: RequireLedgerKey,
    Json(body): Json<DeleteEntriesRequest>,
) -> Result<Json<DeleteEntriesResponse>, AppError> {
    if body.entry_ids.is_empty() {
        return Err(AppError::BadRequest("entryIds must not be empty".to_string()));
    }

    let deleted = state
        .privileged()
        .delete_entries(body.pedido_id, &body.entry_ids)
        .await
        .map_err(AppError::from_store)?;
    state.view().invalidate();

    info!(deleted, "Ledger rows deleted");
    Ok(Json(DeleteEntriesResponse {
        success: true,
        deleted: Some(deleted),
        error: None,
    }))
}

/// Apply a batch of quantity/cost changes, all-or-nothing.
#[instrument(skip(state, _key, body), fields(updates = body.updates.len()))]
pub async fn update_entries(
    State(state): State<AppState>,
    _key: RequireLedgerKey,
    Json(body): Json<BatchUpdateRequest>,
) -> Result<Json<BatchUpdateResponse>, AppError> {
    if body.updates.is_empty() {
        return Err(AppError::BadRequest("updates must not be empty".to_string()));
    }
    if let Some(update) = body.updates.iter().find(|u| is_negative(u)) {
        return Err(AppError::BadRequest(format!(
            "entry {}: quantity and cost must be non-negative",
            update.id
        )));
    }

    state
        .ledger()
        .update_entries(&body.updates)
        .await
        .map_err(AppError::from_store)?;
    state.view().invalidate();

    info!("Ledger rows updated");
    Ok(Json(BatchUpdateResponse {
        success: true,
        error: None,
    }))
}

fn is_negative(update: &LedgerEntryUpdate) -> bool {
    update.quantity_added.is_some_and(|q| q < 0)
        || update.cost.is_some_and(|c| c < Decimal::ZERO)
}

/// Grouped ledger history, newest pedido first.
#[instrument(skip(state))]
pub async fn list_pedidos(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state.view().history().await?;
    let summary = LedgerSummary::of(&history);
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    Ok(Json(HistoryResponse {
        pedidos: history.iter().take(limit).cloned().collect(),
        summary,
    }))
}

/// One pedido by id.
#[instrument(skip(state))]
pub async fn show_pedido(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
) -> Result<Json<Pedido>, AppError> {
    state
        .view()
        .pedido(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("pedido {id}")))
}
