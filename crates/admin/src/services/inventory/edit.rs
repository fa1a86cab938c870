//! Retroactive edits of a pedido's quantities and costs.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use bodega_core::{PedidoId, ProductId, QuantityInput, parse_cost};

use super::outcome::{
    EditOutcome, EditReport, IssueKind, MutationReport, MutationStage, Operation, OperationError,
    ValidationIssue,
};
use super::plan::StockPlan;
use super::{InventoryEngine, changes};
use crate::models::ledger::{LedgerEntry, LedgerEntryUpdate};
use crate::models::product::ColorMatch;

/// New values for one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEdit {
    /// The entry as currently stored.
    pub entry: LedgerEntry,
    /// New quantity; must be a non-negative whole number.
    pub quantity: QuantityInput,
    /// New unit cost; `None` keeps the current cost, blank means zero.
    #[serde(default)]
    pub cost: Option<String>,
}

/// Edit of one pedido's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    pub pedido_id: PedidoId,
    pub changes: Vec<EntryEdit>,
}

struct Checked<'a> {
    entry: &'a LedgerEntry,
    quantity: i32,
    cost: Option<Decimal>,
}

impl Checked<'_> {
    fn delta(&self) -> i64 {
        i64::from(self.quantity) - i64::from(self.entry.quantity_added)
    }

    fn update(&self) -> Option<LedgerEntryUpdate> {
        let quantity_added = (self.delta() != 0).then_some(self.quantity);
        let cost = self.cost.filter(|c| *c != self.entry.cost);
        let update = LedgerEntryUpdate {
            id: self.entry.id,
            quantity_added,
            cost,
        };
        (!update.is_empty()).then_some(update)
    }
}

fn subject(entry: &LedgerEntry) -> String {
    format!(
        "{} {} / {}",
        entry.product_name, entry.product_model, entry.color_name
    )
}

fn issue(entry: &LedgerEntry, kind: IssueKind) -> ValidationIssue {
    ValidationIssue::new(subject(entry), kind)
        .with_entry(entry.id)
        .with_product(entry.product_id)
}

impl InventoryEngine {
    /// Apply new quantities and costs to existing entries of one pedido.
    ///
    /// Every entry is validated before anything is written: quantities and
    /// costs must parse, each entry's product and color (matched by name)
    /// must still exist, and no color may be driven below zero. Stock is
    /// then adjusted by `new - old` per entry (one write per product),
    /// followed by one batched ledger update covering only changed entries.
    ///
    /// A ledger update failure after stock was adjusted is reported but not
    /// rolled back.
    ///
    /// # Errors
    ///
    /// - `OperationError::Validation` if any entry fails preflight
    /// - `OperationError::Unavailable` if products cannot be read
    /// - `OperationError::Mutation` if a write fails
    #[instrument(skip(self, request), fields(pedido_id = %request.pedido_id, entries = request.changes.len()))]
    pub async fn edit(&self, request: &EditRequest) -> Result<EditOutcome, OperationError> {
        let pedido_id = request.pedido_id;
        if request.changes.is_empty() {
            return Err(OperationError::validation(ValidationIssue::new(
                format!("pedido {pedido_id}"),
                IssueKind::EmptyPedido,
            )));
        }

        let mut issues = Vec::new();
        let mut checked = Vec::with_capacity(request.changes.len());
        let mut seen = HashSet::new();

        for change in &request.changes {
            let entry = &change.entry;
            if entry.pedido_id != pedido_id {
                issues.push(issue(entry, IssueKind::PedidoMismatch(entry.pedido_id)));
                continue;
            }
            if !seen.insert(entry.id) {
                issues.push(issue(entry, IssueKind::DuplicateEntry));
                continue;
            }
            if entry.tombstoned_at.is_some() {
                issues.push(issue(entry, IssueKind::EntryTombstoned));
                continue;
            }

            let quantity = change.quantity.exact();
            let cost = change.cost.as_deref().map(parse_cost).transpose();
            match (quantity, cost) {
                (Ok(quantity), Ok(cost)) => checked.push(Checked {
                    entry,
                    quantity,
                    cost,
                }),
                (quantity, cost) => {
                    if let Err(e) = quantity {
                        issues.push(issue(entry, IssueKind::InvalidQuantity(e)));
                    }
                    if let Err(e) = cost {
                        issues.push(issue(entry, IssueKind::InvalidCost(e)));
                    }
                }
            }
        }

        let ids: Vec<ProductId> = checked.iter().map(|c| c.entry.product_id).collect();
        let products = self.catalog.load_fresh(&ids).await?;
        let mut plan = StockPlan::default();

        for c in &checked {
            let Some(product) = products.get(&c.entry.product_id) else {
                issues.push(issue(c.entry, IssueKind::UnknownProduct));
                continue;
            };
            let color = match product.match_color_by_name(&c.entry.color_name) {
                ColorMatch::Found(index) => index,
                ColorMatch::Missing => {
                    issues.push(issue(
                        c.entry,
                        IssueKind::UnknownColor(c.entry.color_name.clone()),
                    ));
                    continue;
                }
                ColorMatch::Ambiguous(matches) => {
                    issues.push(issue(
                        c.entry,
                        IssueKind::AmbiguousColor {
                            color: c.entry.color_name.clone(),
                            matches,
                        },
                    ));
                    continue;
                }
            };
            if c.delta() != 0
                && let Err(kind) = plan.add(product, color, c.delta())
            {
                issues.push(issue(c.entry, kind));
            }
        }

        if !issues.is_empty() {
            return Err(OperationError::Validation(issues));
        }

        let updates: Vec<LedgerEntryUpdate> = checked.iter().filter_map(Checked::update).collect();
        if updates.is_empty() {
            info!(%pedido_id, "Edit has nothing to change");
            return Ok(EditOutcome::NothingToChange { pedido_id });
        }

        let applied = match self.apply_inventory(plan.build()).await {
            Ok(applied) => applied,
            Err(partial) => {
                self.refresh();
                let mut report = MutationReport::new(
                    Operation::Edit,
                    pedido_id,
                    MutationStage::InventoryUpdate,
                    &partial.cause,
                );
                report.inventory_applied = changes(&partial.applied);
                report.inventory_not_applied = changes(&partial.not_applied);
                return Err(OperationError::mutation(report));
            }
        };

        if let Err(e) = self.ledger.update_entries(&updates).await {
            self.refresh();
            let mut report =
                MutationReport::new(Operation::Edit, pedido_id, MutationStage::LedgerUpdate, &e);
            report.inventory_applied = changes(&applied);
            return Err(OperationError::mutation(report));
        }

        self.refresh();

        info!(
            %pedido_id,
            entries_changed = updates.len(),
            products = applied.len(),
            "Pedido edited"
        );
        Ok(EditOutcome::Applied(EditReport {
            pedido_id,
            entries_changed: updates.len(),
            inventory: changes(&applied),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use bodega_core::ColorKey;
    use chrono::Utc;

    use super::*;
    use crate::services::inventory::memory::{MemoryInventory, MemoryLedger, sample_product};
    use crate::services::inventory::{DEFAULT_CATALOG_TTL, IngestRequest};

    struct Fixture {
        inventory: Arc<MemoryInventory>,
        ledger: Arc<MemoryLedger>,
        engine: InventoryEngine,
        pedido_id: PedidoId,
    }

    impl Fixture {
        fn entry(&self, color: &str) -> LedgerEntry {
            self.ledger
                .entries_of(self.pedido_id)
                .into_iter()
                .find(|e| e.color_name == color)
                .unwrap()
        }

        fn edit(&self, changes: Vec<(LedgerEntry, QuantityInput, Option<&str>)>) -> EditRequest {
            EditRequest {
                pedido_id: self.pedido_id,
                changes: changes
                    .into_iter()
                    .map(|(entry, quantity, cost)| EntryEdit {
                        entry,
                        quantity,
                        cost: cost.map(str::to_string),
                    })
                    .collect(),
            }
        }
    }

    /// Mochila Rojo +5 and Azul +3 on top of stock 1 and 0.
    async fn fixture() -> Fixture {
        let inventory = Arc::new(MemoryInventory::default());
        inventory.insert(sample_product(
            1,
            "Mochila",
            &[("Rojo", "#ff0000", 1), ("Azul", "#0000ff", 0)],
        ));
        let ledger = Arc::new(MemoryLedger::default());
        let engine = InventoryEngine::new(inventory.clone(), ledger.clone(), DEFAULT_CATALOG_TTL);

        let request = IngestRequest::new()
            .with(ProductId::new(1), ColorKey::parse("#ff0000").unwrap(), 5)
            .with(ProductId::new(1), ColorKey::parse("#0000ff").unwrap(), 3);
        let pedido_id = engine.ingest(&request).await.unwrap().pedido_id;

        Fixture {
            inventory,
            ledger,
            engine,
            pedido_id,
        }
    }

    #[tokio::test]
    async fn test_edit_applies_delta() {
        let f = fixture().await;
        let request = f.edit(vec![(f.entry("Rojo"), 2.into(), None)]);

        let outcome = f.engine.edit(&request).await.unwrap();
        let EditOutcome::Applied(report) = outcome else {
            panic!("expected applied edit");
        };
        assert_eq!(report.entries_changed, 1);
        assert_eq!(report.inventory[0].colors[0].delta, -3);
        assert_eq!(f.inventory.stock(ProductId::new(1), "Rojo"), Some(3));
        assert_eq!(f.entry("Rojo").quantity_added, 2);
    }

    #[tokio::test]
    async fn test_edit_cost_only_leaves_stock() {
        let f = fixture().await;
        let calls = f.inventory.update_calls();
        let request = f.edit(vec![(f.entry("Azul"), 3.into(), Some("12.345"))]);

        let outcome = f.engine.edit(&request).await.unwrap();
        assert!(matches!(outcome, EditOutcome::Applied(_)));
        assert_eq!(f.inventory.update_calls(), calls);
        assert_eq!(f.inventory.stock(ProductId::new(1), "Azul"), Some(3));
        assert_eq!(f.entry("Azul").cost, Decimal::new(1235, 2));
    }

    #[tokio::test]
    async fn test_edit_without_changes() {
        let f = fixture().await;
        let current = f.entry("Rojo");
        let cost = current.cost.to_string();
        let request = f.edit(vec![(current, "5".into(), Some(cost.as_str()))]);

        let outcome = f.engine.edit(&request).await.unwrap();
        assert_eq!(
            outcome,
            EditOutcome::NothingToChange {
                pedido_id: f.pedido_id
            }
        );
    }

    #[tokio::test]
    async fn test_edit_rejects_negative_stock_without_writing() {
        let f = fixture().await;
        // An external sale takes Rojo from 6 down to 1.
        f.inventory.set_stock(ProductId::new(1), "Rojo", 1);
        let calls = f.inventory.update_calls();

        let request = f.edit(vec![
            (f.entry("Rojo"), 0.into(), None),
            (f.entry("Azul"), 4.into(), None),
        ]);
        let err = f.engine.edit(&request).await.unwrap_err();

        let issues = err.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].kind,
            IssueKind::InsufficientStock {
                current: 1,
                required: 5,
                shortfall: 4
            }
        );
        assert_eq!(f.inventory.update_calls(), calls);
        assert_eq!(f.inventory.stock(ProductId::new(1), "Azul"), Some(3));
        assert_eq!(f.entry("Rojo").quantity_added, 5);
    }

    #[tokio::test]
    async fn test_edit_collects_every_issue() {
        let f = fixture().await;
        let mut foreign = f.entry("Azul");
        foreign.pedido_id = PedidoId::generate();
        let mut renamed = f.entry("Rojo");
        renamed.color_name = "Verde".to_string();

        let request = f.edit(vec![
            (renamed, "-1".into(), Some("abc")),
            (foreign, 1.into(), None),
        ]);
        let err = f.engine.edit(&request).await.unwrap_err();
        let kinds: Vec<_> = err.issues().iter().map(|i| &i.kind).collect();

        assert!(kinds.iter().any(|k| matches!(k, IssueKind::InvalidQuantity(_))));
        assert!(kinds.iter().any(|k| matches!(k, IssueKind::InvalidCost(_))));
        assert!(kinds.iter().any(|k| matches!(k, IssueKind::PedidoMismatch(_))));
    }

    #[tokio::test]
    async fn test_edit_unknown_color_and_duplicates() {
        let f = fixture().await;
        let mut renamed = f.entry("Azul");
        renamed.color_name = "Verde".to_string();
        let rojo = f.entry("Rojo");

        let request = f.edit(vec![
            (renamed, 1.into(), None),
            (rojo.clone(), 4.into(), None),
            (rojo, 3.into(), None),
        ]);
        let err = f.engine.edit(&request).await.unwrap_err();
        let kinds: Vec<_> = err.issues().iter().map(|i| i.kind.clone()).collect();

        assert!(kinds.contains(&IssueKind::UnknownColor("Verde".to_string())));
        assert!(kinds.contains(&IssueKind::DuplicateEntry));
    }

    #[tokio::test]
    async fn test_edit_rejects_tombstoned_entry() {
        let f = fixture().await;
        let mut entry = f.entry("Rojo");
        entry.tombstoned_at = Some(Utc::now());

        let err = f
            .engine
            .edit(&f.edit(vec![(entry, 1.into(), None)]))
            .await
            .unwrap_err();
        assert_eq!(err.issues()[0].kind, IssueKind::EntryTombstoned);
    }

    #[tokio::test]
    async fn test_edit_ledger_failure_leaves_stock_changed() {
        let f = fixture().await;
        f.ledger.fail_updates();
        let request = f.edit(vec![(f.entry("Rojo"), 7.into(), None)]);

        let err = f.engine.edit(&request).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::LedgerUpdate);
        assert!(report.rollback.is_none());
        assert_eq!(report.inventory_applied.len(), 1);
        assert!(report.needs_reconciliation());

        // Stock moved, ledger did not.
        assert_eq!(f.inventory.stock(ProductId::new(1), "Rojo"), Some(8));
        assert_eq!(f.entry("Rojo").quantity_added, 5);
    }
}
