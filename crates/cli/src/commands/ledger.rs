//! Ledger operations: ingest, edit, delete, history.
//!
//! # Input files
//!
//! `ingest` reads a JSON array of lines:
//!
//! ```json
//! [{"product_id": 7, "color_key": "#FF0000", "quantity": 5}]
//! ```
//!
//! `edit` reads a JSON array of changes to entries of the given pedido:
//!
//! ```json
//! [{"entry_id": "1b4e...", "quantity": "2", "cost": "12.50"}]
//! ```

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use bodega_admin::models::ledger::LedgerEntry;
use bodega_admin::services::inventory::{
    DeleteRequest, EditOutcome, EditRequest, EntryEdit, IngestLine, IngestRequest, LedgerSummary,
    MutationReport, OperationError,
};
use bodega_core::{LedgerEntryId, PedidoId, QuantityInput};

use super::{CommandError, connect};

/// One line of an edit file.
#[derive(Debug, Deserialize)]
struct EditLine {
    entry_id: LedgerEntryId,
    quantity: QuantityInput,
    #[serde(default)]
    cost: Option<String>,
}

/// Record a new pedido.
pub async fn ingest(file: &Path) -> Result<(), CommandError> {
    let lines: Vec<IngestLine> = read_json(file).await?;
    let request = IngestRequest::from(lines);

    let (engine, _) = connect().await?;
    let report = engine.ingest(&request).await.map_err(report_failure)?;

    info!(
        pedido_id = %report.pedido_id,
        entries = report.entry_count,
        units = report.units_added,
        "Pedido recorded"
    );
    for item in &report.skipped {
        warn!("Skipped {item}");
    }
    for change in &report.inventory {
        info!("  {change}");
    }
    Ok(())
}

/// Edit the entries of one pedido.
pub async fn edit(pedido_id: PedidoId, file: &Path) -> Result<(), CommandError> {
    let lines: Vec<EditLine> = read_json(file).await?;

    let (engine, ledger) = connect().await?;
    let entries = ledger.find_by_pedido(pedido_id).await?;
    let request = build_edit(pedido_id, &entries, lines)?;

    match engine.edit(&request).await.map_err(report_failure)? {
        EditOutcome::Applied(report) => {
            info!(
                pedido_id = %report.pedido_id,
                entries = report.entries_changed,
                "Pedido edited"
            );
            for change in &report.inventory {
                info!("  {change}");
            }
        }
        EditOutcome::NothingToChange { pedido_id } => {
            info!(%pedido_id, "Nothing to change");
        }
    }
    Ok(())
}

/// Reverse a pedido and remove its entries.
pub async fn delete(pedido_id: PedidoId) -> Result<(), CommandError> {
    let (engine, ledger) = connect().await?;
    let entries = ledger.find_by_pedido(pedido_id).await?;
    if entries.is_empty() {
        return Err(CommandError::Invalid(format!("pedido {pedido_id} has no entries")));
    }

    let request = DeleteRequest {
        pedido_id,
        entries,
    };
    let report = engine.delete(&request).await.map_err(report_failure)?;

    info!(
        pedido_id = %report.pedido_id,
        units = report.units_reversed,
        strategy = %report.strategy,
        tombstoned = report.tombstoned(),
        "Pedido deleted"
    );
    for attempt in &report.attempts {
        info!("  attempt {attempt}");
    }
    for change in &report.inventory {
        info!("  {change}");
    }
    Ok(())
}

/// Print the most recent pedidos.
#[allow(clippy::print_stdout)]
pub async fn history(limit: usize) -> Result<(), CommandError> {
    let (engine, _) = connect().await?;
    let pedidos = engine.view().history().await?;
    let summary = LedgerSummary::of(&pedidos);

    for pedido in pedidos.iter().take(limit) {
        println!(
            "{}  {}  {} entries  {} units  cost {}  price {}",
            pedido.created_at.format("%Y-%m-%d %H:%M"),
            pedido.pedido_id,
            pedido.totals.entry_count,
            pedido.totals.units,
            pedido.totals.cost,
            pedido.totals.price,
        );
        for entry in &pedido.entries {
            println!(
                "    {} {} / {}  x{}  @ {}",
                entry.product_name,
                entry.product_model,
                entry.color_name,
                entry.quantity_added,
                entry.cost,
            );
        }
    }
    println!(
        "{} pedidos, {} entries, {} units, cost {}, price {}",
        summary.pedidos, summary.entries, summary.units, summary.cost, summary.price
    );
    Ok(())
}

/// Pair each edit line with the stored entry it names.
fn build_edit(
    pedido_id: PedidoId,
    entries: &[LedgerEntry],
    lines: Vec<EditLine>,
) -> Result<EditRequest, CommandError> {
    let changes = lines
        .into_iter()
        .map(|line| {
            let entry = entries
                .iter()
                .find(|e| e.id == line.entry_id)
                .cloned()
                .ok_or_else(|| {
                    CommandError::Invalid(format!(
                        "entry {} is not part of pedido {pedido_id}",
                        line.entry_id
                    ))
                })?;
            Ok(EntryEdit {
                entry,
                quantity: line.quantity,
                cost: line.cost,
            })
        })
        .collect::<Result<Vec<_>, CommandError>>()?;

    Ok(EditRequest { pedido_id, changes })
}

/// Log the details of a failed operation before surfacing it.
fn report_failure(err: OperationError) -> CommandError {
    match &err {
        OperationError::Validation(issues) => {
            for issue in issues {
                error!("  {issue}");
            }
        }
        OperationError::Mutation(report) => log_mutation(report),
        OperationError::Unavailable(_) => {}
    }
    err.into()
}

fn log_mutation(report: &MutationReport) {
    for change in &report.inventory_applied {
        warn!("  applied: {change}");
    }
    for change in &report.inventory_not_applied {
        warn!("  not applied: {change}");
    }
    for attempt in &report.attempts {
        warn!("  attempt {attempt}");
    }
    if let Some(rollback) = &report.rollback {
        for (product_id, cause) in &rollback.failed {
            error!(%product_id, %cause, "  rollback failed");
        }
    }
    if report.needs_reconciliation() {
        error!(
            pedido_id = %report.pedido_id,
            ledger_written = report.ledger_written,
            "Inventory and ledger may disagree; reconcile manually"
        );
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CommandError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Input {
            path: display.clone(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| CommandError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    use bodega_core::ProductId;

    fn entry(pedido_id: PedidoId) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::generate(),
            pedido_id,
            product_id: ProductId::new(1),
            product_name: "Mochila".to_string(),
            product_model: "M-1".to_string(),
            color_name: "Rojo".to_string(),
            quantity_added: 5,
            cost: 10.into(),
            price: 25.into(),
            created_at: chrono::Utc::now(),
            tombstoned_at: None,
        }
    }

    #[test]
    fn test_build_edit_pairs_lines_with_entries() {
        let pedido = PedidoId::generate();
        let stored = entry(pedido);
        let json = format!(r#"[{{"entry_id": "{}", "quantity": "2", "cost": "12.50"}}]"#, stored.id);
        let lines: Vec<EditLine> = serde_json::from_str(&json).unwrap();

        let request = build_edit(pedido, std::slice::from_ref(&stored), lines).unwrap();

        assert_eq!(request.changes.len(), 1);
        assert_eq!(request.changes[0].entry, stored);
        assert_eq!(request.changes[0].quantity, QuantityInput::Text("2".to_string()));
        assert_eq!(request.changes[0].cost.as_deref(), Some("12.50"));
    }

    #[test]
    fn test_build_edit_rejects_foreign_entry() {
        let pedido = PedidoId::generate();
        let lines = vec![EditLine {
            entry_id: LedgerEntryId::generate(),
            quantity: QuantityInput::Integer(1),
            cost: None,
        }];

        let err = build_edit(pedido, &[entry(pedido)], lines).unwrap_err();
        assert!(err.to_string().contains("is not part of pedido"));
    }
}
