//! Full reversal of a pedido.
//!
//! Deletion runs as a small saga:
//!
//! ```text
//! Pending ──reverse stock──▶ Reversed ──remove rows──▶ LedgerDeleted ────▶ Done
//!    │                          │    └──tombstone────▶ LedgerTombstoned ─▶ Done
//!    │ partial reversal         │ every strategy failed
//!    └──────────────────────────┴────────────────────▶ RolledBack
//! ```
//!
//! Ledger removal escalates through [`DeleteStrategy::ESCALATION`] until one
//! strategy removes the rows. When none removes anything, every product
//! written during reversal is restored to its preflight snapshot. When rows
//! were removed but none of the strategies completed, only the entries whose
//! rows survive get their stock back.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use bodega_core::{DeletePhase, DeleteStrategy, LedgerEntryId, PedidoId, ProductId};

use super::outcome::{
    AttemptOutcome, ColorChange, DeleteReport, IssueKind, MutationReport, MutationStage,
    Operation, OperationError, ProductChange, RollbackReport, StrategyAttempt, ValidationIssue,
};
use super::plan::{PlannedProduct, StockPlan, units_removed};
use super::store::StoreError;
use super::{InventoryEngine, changes};
use crate::models::ledger::LedgerEntry;
use crate::models::product::{ColorMatch, Product};

/// Reversal of one pedido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub pedido_id: PedidoId,
    /// Every current entry of the pedido.
    pub entries: Vec<LedgerEntry>,
}

/// Phase tracker that logs every transition.
struct DeleteSaga {
    pedido_id: PedidoId,
    phases: Vec<DeletePhase>,
}

impl DeleteSaga {
    fn start(pedido_id: PedidoId) -> Self {
        info!(%pedido_id, to = %DeletePhase::Pending, "Delete saga started");
        Self {
            pedido_id,
            phases: vec![DeletePhase::Pending],
        }
    }

    fn phase(&self) -> DeletePhase {
        self.phases.last().copied().unwrap_or(DeletePhase::Pending)
    }

    fn advance(&mut self, to: DeletePhase) {
        let from = self.phase();
        debug_assert!(from.can_transition_to(to), "invalid transition {from} -> {to}");
        if to == DeletePhase::RolledBack {
            warn!(pedido_id = %self.pedido_id, %from, %to, "Delete saga transition");
        } else {
            info!(pedido_id = %self.pedido_id, %from, %to, "Delete saga transition");
        }
        self.phases.push(to);
    }
}

/// Tracks rows removed across strategies.
struct Removal<'a> {
    pedido_id: PedidoId,
    ids: &'a [LedgerEntryId],
    removed: u64,
    /// Last strategy that removed any row.
    effective: Option<DeleteStrategy>,
    attempts: Vec<StrategyAttempt>,
}

impl Removal<'_> {
    fn expected(&self) -> u64 {
        u64::try_from(self.ids.len()).unwrap_or(u64::MAX)
    }

    /// Record one strategy's result; returns whether removal is complete.
    fn record(&mut self, strategy: DeleteStrategy, result: Option<Result<u64, StoreError>>) -> bool {
        let outcome = match result {
            None => AttemptOutcome::Unavailable,
            Some(Err(e)) => {
                warn!(pedido_id = %self.pedido_id, %strategy, error = %e, "Ledger removal strategy failed");
                AttemptOutcome::Failed(e.to_string())
            }
            Some(Ok(n)) => {
                self.removed += n;
                if n > 0 {
                    self.effective = Some(strategy);
                }
                let complete = match strategy {
                    DeleteStrategy::PrivilegedById | DeleteStrategy::ById => {
                        self.removed >= self.expected()
                    }
                    DeleteStrategy::ByPedido => n > 0 || self.removed >= self.expected(),
                    DeleteStrategy::Tombstone => n > 0,
                };
                if complete {
                    AttemptOutcome::Removed(n)
                } else {
                    AttemptOutcome::Incomplete {
                        removed: n,
                        expected: self.expected(),
                    }
                }
            }
        };

        let done = matches!(outcome, AttemptOutcome::Removed(_));
        self.attempts.push(StrategyAttempt { strategy, outcome });
        done
    }

    /// Failure report carrying every attempt.
    fn failure(self) -> MutationReport {
        let cause = self
            .attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut report = MutationReport::new(
            Operation::Delete,
            self.pedido_id,
            MutationStage::LedgerRemoval,
            cause,
        );
        report.attempts = self.attempts;
        report
    }
}

fn issue(entry: &LedgerEntry, kind: IssueKind) -> ValidationIssue {
    ValidationIssue::new(
        format!(
            "{} {} / {}",
            entry.product_name, entry.product_model, entry.color_name
        ),
        kind,
    )
    .with_entry(entry.id)
    .with_product(entry.product_id)
}

impl InventoryEngine {
    /// Reverse a pedido's stock impact and remove its ledger rows.
    ///
    /// Preflight requires that subtracting every entry's quantity leaves each
    /// color at or above zero. Stock is reversed first (one write per
    /// product), then the rows are removed by the first ledger strategy that
    /// succeeds. If reversal stops partway or no strategy removes anything,
    /// the reversed products are restored from their preflight snapshots. If
    /// rows were removed without any strategy completing, the ledger is
    /// re-read and only the surviving entries are restored.
    ///
    /// # Errors
    ///
    /// - `OperationError::Validation` if any entry fails preflight
    /// - `OperationError::Unavailable` if products cannot be read
    /// - `OperationError::Mutation` if reversal or removal fails (with a
    ///   rollback report)
    #[instrument(skip(self, request), fields(pedido_id = %request.pedido_id, entries = request.entries.len()))]
    pub async fn delete(&self, request: &DeleteRequest) -> Result<DeleteReport, OperationError> {
        let pedido_id = request.pedido_id;
        if request.entries.is_empty() {
            return Err(OperationError::validation(ValidationIssue::new(
                format!("pedido {pedido_id}"),
                IssueKind::EmptyPedido,
            )));
        }

        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        let mut reversible = Vec::new();

        for entry in &request.entries {
            if entry.pedido_id != pedido_id {
                issues.push(issue(entry, IssueKind::PedidoMismatch(entry.pedido_id)));
            } else if !seen.insert(entry.id) {
                issues.push(issue(entry, IssueKind::DuplicateEntry));
            } else if entry.quantity_added > 0 && entry.tombstoned_at.is_none() {
                reversible.push(entry);
            }
        }

        let product_ids: Vec<ProductId> = reversible.iter().map(|e| e.product_id).collect();
        let products = self.catalog.load_fresh(&product_ids).await?;
        let mut plan = StockPlan::default();

        for entry in reversible {
            let Some(product) = products.get(&entry.product_id) else {
                issues.push(issue(entry, IssueKind::UnknownProduct));
                continue;
            };
            let color = match product.match_color_by_name(&entry.color_name) {
                ColorMatch::Found(index) => index,
                ColorMatch::Missing => {
                    issues.push(issue(entry, IssueKind::UnknownColor(entry.color_name.clone())));
                    continue;
                }
                ColorMatch::Ambiguous(matches) => {
                    issues.push(issue(
                        entry,
                        IssueKind::AmbiguousColor {
                            color: entry.color_name.clone(),
                            matches,
                        },
                    ));
                    continue;
                }
            };
            if let Err(kind) = plan.add(product, color, -i64::from(entry.quantity_added)) {
                issues.push(issue(entry, kind));
            }
        }

        if !issues.is_empty() {
            return Err(OperationError::Validation(issues));
        }

        let mut saga = DeleteSaga::start(pedido_id);

        // Step 1-2: snapshots live in `PlannedProduct::before`; reverse.
        let reversed = match self.apply_inventory(plan.build()).await {
            Ok(reversed) => reversed,
            Err(partial) => {
                let rollback = self.restore(&partial.applied).await;
                saga.advance(DeletePhase::RolledBack);
                self.refresh();

                let (changed, restored) = split_restores(&partial.applied, &rollback.failed);
                let mut report = MutationReport::new(
                    Operation::Delete,
                    pedido_id,
                    MutationStage::InventoryUpdate,
                    &partial.cause,
                );
                report.inventory_applied = changes(&changed);
                report.inventory_not_applied = changes(&restored);
                report.inventory_not_applied.extend(changes(&partial.not_applied));
                report.rollback = Some(rollback);
                return Err(OperationError::mutation(report));
            }
        };
        saga.advance(DeletePhase::Reversed);

        // Step 3: escalate through removal strategies.
        let ids: Vec<LedgerEntryId> = request.entries.iter().map(|e| e.id).collect();
        let mut removal = Removal {
            pedido_id,
            ids: &ids,
            removed: 0,
            effective: None,
            attempts: Vec::with_capacity(DeleteStrategy::ESCALATION.len()),
        };
        let mut winner = None;

        for strategy in DeleteStrategy::ESCALATION {
            let result = self.run_strategy(strategy, pedido_id, &ids).await;
            if removal.record(strategy, result) {
                winner = Some(strategy);
                break;
            }
        }

        match (winner, removal.effective) {
            (Some(strategy), _) => Ok(self.complete(saga, strategy, removal, &reversed)),
            // Step 4: nothing was removed; restore snapshots.
            (None, None) => Err(self.roll_back_removal(saga, removal, &reversed).await),
            (None, Some(strategy)) => {
                self.settle_partial_removal(saga, strategy, removal, &request.entries, &reversed)
                    .await
            }
        }
    }

    fn complete(
        &self,
        mut saga: DeleteSaga,
        strategy: DeleteStrategy,
        removal: Removal<'_>,
        reversed: &[PlannedProduct],
    ) -> DeleteReport {
        let pedido_id = removal.pedido_id;
        saga.advance(if strategy.is_soft() {
            DeletePhase::LedgerTombstoned
        } else {
            DeletePhase::LedgerDeleted
        });
        saga.advance(DeletePhase::Done);
        self.refresh();

        let report = DeleteReport {
            pedido_id,
            units_reversed: units_removed(reversed),
            strategy,
            phases: saga.phases,
            attempts: removal.attempts,
            inventory: changes(reversed),
        };
        info!(
            %pedido_id,
            units = report.units_reversed,
            %strategy,
            "Pedido deleted"
        );
        report
    }

    /// Restore every reversed product after no strategy removed a row.
    async fn roll_back_removal(
        &self,
        mut saga: DeleteSaga,
        removal: Removal<'_>,
        reversed: &[PlannedProduct],
    ) -> OperationError {
        error!(pedido_id = %removal.pedido_id, "Every ledger removal strategy failed; rolling back");
        let rollback = self.restore(reversed).await;
        saga.advance(DeletePhase::RolledBack);
        self.refresh();

        let (changed, restored) = split_restores(reversed, &rollback.failed);
        let mut report = removal.failure();
        report.inventory_applied = changes(&changed);
        report.inventory_not_applied = changes(&restored);
        report.rollback = Some(rollback);
        OperationError::mutation(report)
    }

    /// Settle a removal that deleted some rows without completing.
    ///
    /// The ledger is re-read. When none of the pedido's rows survive, the
    /// delete is complete under `strategy`, the last strategy that removed
    /// rows. Otherwise stock is put back for the surviving entries only, so
    /// the rows that are gone stay reversed, and the failure is flagged for
    /// reconciliation.
    async fn settle_partial_removal(
        &self,
        mut saga: DeleteSaga,
        strategy: DeleteStrategy,
        removal: Removal<'_>,
        entries: &[LedgerEntry],
        reversed: &[PlannedProduct],
    ) -> Result<DeleteReport, OperationError> {
        let pedido_id = removal.pedido_id;
        let live: HashSet<LedgerEntryId> = match self.ledger.entries_for_pedido(pedido_id).await {
            Ok(rows) => rows
                .into_iter()
                .filter(|r| r.tombstoned_at.is_none())
                .map(|r| r.id)
                .collect(),
            Err(e) => {
                error!(%pedido_id, error = %e, "Cannot tell which ledger rows survived; stock left reversed");
                self.refresh();
                let mut report = removal.failure();
                report.cause = format!("{}; re-reading ledger failed: {e}", report.cause);
                report.inventory_applied = changes(reversed);
                report.ledger_written = true;
                return Err(OperationError::mutation(report));
            }
        };

        let surviving: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| e.quantity_added > 0 && e.tombstoned_at.is_none() && live.contains(&e.id))
            .collect();
        if surviving.is_empty() {
            info!(%pedido_id, removed = removal.removed, "No ledger rows survived removal");
            return Ok(self.complete(saga, strategy, removal, reversed));
        }

        warn!(
            %pedido_id,
            removed = removal.removed,
            surviving = surviving.len(),
            "Ledger removal stopped partway; restoring stock of surviving entries"
        );
        let mut rollback = RollbackReport::default();
        let mut plan = StockPlan::default();
        for entry in surviving {
            let current = reversed.iter().find(|p| p.after.id == entry.product_id);
            let planned = current.and_then(|p| match p.after.match_color_by_name(&entry.color_name) {
                ColorMatch::Found(index) => plan
                    .add(&p.after, index, i64::from(entry.quantity_added))
                    .ok(),
                ColorMatch::Missing | ColorMatch::Ambiguous(_) => None,
            });
            if planned.is_none() {
                rollback
                    .failed
                    .push((entry.product_id, format!("cannot restore entry {}", entry.id)));
            }
        }

        let restores = match self.apply_inventory(plan.build()).await {
            Ok(applied) => applied,
            Err(partial) => {
                let cause = partial.cause.to_string();
                rollback.failed.extend(
                    partial
                        .not_applied
                        .iter()
                        .map(|p| (p.after.id, cause.clone())),
                );
                partial.applied
            }
        };
        rollback.restored = restores.iter().map(|p| p.after.id).collect();
        saga.advance(DeletePhase::RolledBack);
        self.refresh();

        let mut report = removal.failure();
        for planned in reversed {
            let current = restores
                .iter()
                .find(|r| r.after.id == planned.after.id)
                .map_or(&planned.after, |r| &r.after);
            match net_change(&planned.before, current) {
                Some(change) => report.inventory_applied.push(change),
                None => report.inventory_not_applied.push(planned.change.clone()),
            }
        }
        report.ledger_written = true;
        report.rollback = Some(rollback);
        Err(OperationError::mutation(report))
    }

    /// Run one removal strategy; `None` when it is not configured.
    async fn run_strategy(
        &self,
        strategy: DeleteStrategy,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Option<Result<u64, StoreError>> {
        let result = match strategy {
            DeleteStrategy::PrivilegedById => {
                self.privileged
                    .as_ref()?
                    .delete_entries(pedido_id, ids)
                    .await
            }
            DeleteStrategy::ById => self.ledger.delete_by_ids(ids).await,
            DeleteStrategy::ByPedido => self.ledger.delete_by_pedido(pedido_id).await,
            DeleteStrategy::Tombstone => self.ledger.tombstone(pedido_id, ids).await,
        };
        Some(result)
    }
}

/// Split planned products into those whose rollback write failed, and so
/// remain changed, and those restored.
fn split_restores(
    products: &[PlannedProduct],
    failed: &[(ProductId, String)],
) -> (Vec<PlannedProduct>, Vec<PlannedProduct>) {
    products
        .iter()
        .cloned()
        .partition(|p| failed.iter().any(|(id, _)| *id == p.before.id))
}

/// Stock difference between a preflight snapshot and a later state.
fn net_change(before: &Product, current: &Product) -> Option<ProductChange> {
    let colors: Vec<ColorChange> = before
        .colors
        .iter()
        .zip(&current.colors)
        .filter(|(b, c)| b.stock != c.stock)
        .map(|(b, c)| ColorChange {
            color_name: c.name.clone(),
            delta: c.stock - b.stock,
        })
        .collect();
    (!colors.is_empty()).then(|| ProductChange {
        product_id: before.id,
        product_name: before.label(),
        colors,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use bodega_core::ColorKey;

    use super::*;
    use crate::services::inventory::memory::{
        Fault, MemoryInventory, MemoryLedger, MemoryPrivilegedLedger, sample_product,
    };
    use crate::services::inventory::store::StockLedger;
    use crate::services::inventory::{DEFAULT_CATALOG_TTL, IngestRequest};

    struct Fixture {
        inventory: Arc<MemoryInventory>,
        ledger: Arc<MemoryLedger>,
        engine: InventoryEngine,
        pedido_id: PedidoId,
    }

    impl Fixture {
        fn request(&self) -> DeleteRequest {
            DeleteRequest {
                pedido_id: self.pedido_id,
                entries: self.ledger.entries_of(self.pedido_id),
            }
        }

        fn stock(&self, id: i32, color: &str) -> Option<i32> {
            self.inventory.stock(ProductId::new(id), color)
        }
    }

    /// Mochila Rojo +5 (stock 6) and Bolso Azul +3 (stock 5).
    async fn fixture() -> Fixture {
        let inventory = Arc::new(MemoryInventory::default());
        inventory.insert(sample_product(1, "Mochila", &[("Rojo", "#ff0000", 1)]));
        inventory.insert(sample_product(2, "Bolso", &[("Azul", "#0000ff", 2)]));
        let ledger = Arc::new(MemoryLedger::default());
        let engine = InventoryEngine::new(inventory.clone(), ledger.clone(), DEFAULT_CATALOG_TTL);

        let request = IngestRequest::new()
            .with(ProductId::new(1), ColorKey::parse("#ff0000").unwrap(), 5)
            .with(ProductId::new(2), ColorKey::parse("#0000ff").unwrap(), 3);
        let pedido_id = engine.ingest(&request).await.unwrap().pedido_id;

        Fixture {
            inventory,
            ledger,
            engine,
            pedido_id,
        }
    }

    #[tokio::test]
    async fn test_delete_reverses_and_removes() {
        let f = fixture().await;
        let report = f.engine.delete(&f.request()).await.unwrap();

        assert_eq!(report.units_reversed, 8);
        assert_eq!(report.strategy, DeleteStrategy::ById);
        assert_eq!(
            report.phases,
            vec![
                DeletePhase::Pending,
                DeletePhase::Reversed,
                DeletePhase::LedgerDeleted,
                DeletePhase::Done
            ]
        );
        // No privileged client configured.
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Unavailable);
        assert_eq!(f.stock(1, "Rojo"), Some(1));
        assert_eq!(f.stock(2, "Azul"), Some(2));
        assert!(f.ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn test_delete_prefers_privileged_path() {
        let f = fixture().await;
        let privileged = Arc::new(MemoryPrivilegedLedger::new(f.ledger.clone()));
        let engine = f.engine.clone().with_privileged_ledger(privileged.clone());

        let report = engine.delete(&f.request()).await.unwrap();
        assert_eq!(report.strategy, DeleteStrategy::PrivilegedById);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(privileged.calls(), 1);
        assert!(f.ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_pedido_key() {
        let f = fixture().await;
        f.ledger.fail_delete_by_ids(Fault::NoOp);

        let report = f.engine.delete(&f.request()).await.unwrap();
        assert_eq!(report.strategy, DeleteStrategy::ByPedido);
        assert_eq!(
            report.attempts[1].outcome,
            AttemptOutcome::Incomplete {
                removed: 0,
                expected: 2
            }
        );
        assert!(f.ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_tombstone() {
        let f = fixture().await;
        f.ledger.fail_delete_by_ids(Fault::Error);
        f.ledger.fail_delete_by_pedido(Fault::Error);

        let report = f.engine.delete(&f.request()).await.unwrap();
        assert!(report.tombstoned());
        assert_eq!(report.phases[2], DeletePhase::LedgerTombstoned);

        let rows = f.ledger.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.quantity_added == 0 && r.tombstoned_at.is_some()));
        assert!(f.engine.view().pedido(f.pedido_id).await.unwrap().is_none());
        assert_eq!(f.stock(1, "Rojo"), Some(1));
    }

    #[tokio::test]
    async fn test_delete_rolls_back_when_every_strategy_fails() {
        let f = fixture().await;
        f.ledger.fail_delete_by_ids(Fault::Error);
        f.ledger.fail_delete_by_pedido(Fault::NoOp);
        f.ledger.fail_tombstone(Fault::Error);

        let err = f.engine.delete(&f.request()).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::LedgerRemoval);
        assert_eq!(report.attempts.len(), 4);
        assert!(report.rollback.as_ref().unwrap().is_complete());
        assert!(report.inventory_applied.is_empty());
        assert!(!report.needs_reconciliation());

        assert_eq!(f.stock(1, "Rojo"), Some(6));
        assert_eq!(f.stock(2, "Azul"), Some(5));
        assert_eq!(f.ledger.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_restore_is_listed_once() {
        let f = fixture().await;
        f.ledger.fail_delete_by_ids(Fault::Error);
        f.ledger.fail_delete_by_pedido(Fault::Error);
        f.ledger.fail_tombstone(Fault::Error);
        // Both reversal writes and the first restore succeed.
        f.inventory.fail_updates_after(3);

        let err = f.engine.delete(&f.request()).await.unwrap_err();
        let report = err.report().unwrap();
        let rollback = report.rollback.as_ref().unwrap();
        assert_eq!(rollback.restored, vec![ProductId::new(1)]);
        assert_eq!(rollback.failed[0].0, ProductId::new(2));
        assert!(report.needs_reconciliation());

        let applied: Vec<_> = report.inventory_applied.iter().map(|c| c.product_id).collect();
        let not_applied: Vec<_> = report
            .inventory_not_applied
            .iter()
            .map(|c| c.product_id)
            .collect();
        assert_eq!(applied, vec![ProductId::new(2)]);
        assert_eq!(not_applied, vec![ProductId::new(1)]);

        assert_eq!(f.stock(1, "Rojo"), Some(6));
        assert_eq!(f.stock(2, "Azul"), Some(2));
    }

    #[tokio::test]
    async fn test_partial_removal_restores_only_surviving_entries() {
        let f = fixture().await;
        f.ledger.fail_delete_by_ids(Fault::Partial(1));
        f.ledger.fail_delete_by_pedido(Fault::Error);
        f.ledger.fail_tombstone(Fault::Error);

        let err = f.engine.delete(&f.request()).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::LedgerRemoval);
        assert_eq!(
            report.attempts[1].outcome,
            AttemptOutcome::Incomplete {
                removed: 1,
                expected: 2
            }
        );
        assert!(report.ledger_written);
        assert!(report.needs_reconciliation());

        let rows = f.ledger.rows();
        assert_eq!(rows.len(), 1);
        let survivor = rows[0].product_id;
        assert_eq!(report.rollback.as_ref().unwrap().restored, vec![survivor]);
        assert_eq!(report.inventory_applied.len(), 1);
        assert_ne!(report.inventory_applied[0].product_id, survivor);
        assert_eq!(report.inventory_not_applied.len(), 1);
        assert_eq!(report.inventory_not_applied[0].product_id, survivor);

        // The removed row stays reversed; the surviving one keeps its stock.
        for (id, color, reversed, recorded) in [(1, "Rojo", 1, 6), (2, "Azul", 2, 5)] {
            let expected = if survivor == ProductId::new(id) {
                recorded
            } else {
                reversed
            };
            assert_eq!(f.stock(id, color), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_partial_removal_with_nothing_left_completes() {
        let f = fixture().await;
        let request = f.request();
        // One row vanishes before the delete runs.
        f.ledger.delete_by_ids(&[request.entries[0].id]).await.unwrap();
        f.ledger.fail_delete_by_pedido(Fault::Error);
        f.ledger.fail_tombstone(Fault::Error);

        let report = f.engine.delete(&request).await.unwrap();
        assert_eq!(report.strategy, DeleteStrategy::ById);
        assert_eq!(
            report.phases,
            vec![
                DeletePhase::Pending,
                DeletePhase::Reversed,
                DeletePhase::LedgerDeleted,
                DeletePhase::Done
            ]
        );
        assert_eq!(report.attempts.len(), 4);
        assert!(f.ledger.rows().is_empty());
        assert_eq!(f.stock(1, "Rojo"), Some(1));
        assert_eq!(f.stock(2, "Azul"), Some(2));
    }

    #[tokio::test]
    async fn test_delete_partial_reversal_rolls_back() {
        let f = fixture().await;
        f.inventory.fail_updates_for(ProductId::new(2));

        let err = f.engine.delete(&f.request()).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::InventoryUpdate);
        assert_eq!(
            report.rollback.as_ref().unwrap().restored,
            vec![ProductId::new(1)]
        );

        assert_eq!(f.stock(1, "Rojo"), Some(6));
        assert_eq!(f.stock(2, "Azul"), Some(5));
        assert_eq!(f.ledger.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_rejected_after_external_sale() {
        let f = fixture().await;
        f.inventory.set_stock(ProductId::new(2), "Azul", 2);
        let calls = f.inventory.update_calls();

        let err = f.engine.delete(&f.request()).await.unwrap_err();
        let issues = err.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].product_id, Some(ProductId::new(2)));
        assert!(matches!(
            issues[0].kind,
            IssueKind::InsufficientStock { shortfall: 1, .. }
        ));

        assert_eq!(f.inventory.update_calls(), calls);
        assert_eq!(f.stock(1, "Rojo"), Some(6));
        assert_eq!(f.ledger.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_empty_pedido() {
        let f = fixture().await;
        let request = DeleteRequest {
            pedido_id: f.pedido_id,
            entries: Vec::new(),
        };
        let err = f.engine.delete(&request).await.unwrap_err();
        assert_eq!(err.issues()[0].kind, IssueKind::EmptyPedido);
    }

    #[test]
    fn test_removal_counts_across_strategies() {
        let ids = [LedgerEntryId::generate(), LedgerEntryId::generate()];
        let mut removal = Removal {
            pedido_id: PedidoId::generate(),
            ids: &ids,
            removed: 0,
            effective: None,
            attempts: Vec::new(),
        };

        assert!(!removal.record(DeleteStrategy::PrivilegedById, None));
        assert!(!removal.record(DeleteStrategy::ById, Some(Ok(1))));
        assert!(removal.record(DeleteStrategy::ByPedido, Some(Ok(1))));
        assert_eq!(removal.removed, 2);
    }
}
