//! Inventory ledger reconciliation engine.
//!
//! Keeps per-color product stock consistent with the append-only stock
//! ledger across three operations:
//!
//! - [`InventoryEngine::ingest`] - write a new pedido and increment stock
//! - [`InventoryEngine::edit`] - change quantities/costs of a pedido's entries
//! - [`InventoryEngine::delete`] - reverse a pedido and remove its entries
//!
//! No transaction spans the two stores. Every operation validates all of its
//! input against freshly read state before the first write, then writes in a
//! fixed order. Only `delete` restores inventory when a later step fails;
//! `ingest` and `edit` report exactly which products were written and leave
//! reconciliation to the operator.

mod catalog;
mod delete;
mod edit;
mod ingest;
mod ledger_view;
mod outcome;
mod plan;
mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

pub use catalog::{DEFAULT_CATALOG_TTL, ProductCatalog};
pub use delete::DeleteRequest;
pub use edit::{EditRequest, EntryEdit};
pub use ingest::{IngestLine, IngestRequest};
pub use ledger_view::{LedgerSummary, LedgerView, Pedido, PedidoTotals, group_entries};
pub use outcome::{
    AttemptOutcome, ColorChange, DeleteReport, EditOutcome, EditReport, IngestReport, IssueKind,
    MutationReport, MutationStage, Operation, OperationError, ProductChange, RollbackReport,
    SkipReason, SkippedItem, StrategyAttempt, ValidationIssue,
};
pub use store::{InventoryStore, PrivilegedLedger, StockLedger, StoreError};

use plan::PlannedProduct;

/// Inventory writes that stopped partway.
struct PartialApply {
    applied: Vec<PlannedProduct>,
    not_applied: Vec<PlannedProduct>,
    cause: StoreError,
}

/// Entry point for ledger operations.
#[derive(Clone)]
pub struct InventoryEngine {
    catalog: ProductCatalog,
    ledger: Arc<dyn StockLedger>,
    privileged: Option<Arc<dyn PrivilegedLedger>>,
    view: LedgerView,
}

impl InventoryEngine {
    /// Create an engine over the given stores.
    ///
    /// `cache_ttl` bounds how long cached products and ledger groupings are
    /// served between invalidations.
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        ledger: Arc<dyn StockLedger>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            catalog: ProductCatalog::new(inventory, cache_ttl),
            view: LedgerView::new(Arc::clone(&ledger), cache_ttl),
            ledger,
            privileged: None,
        }
    }

    /// Enable the privileged deletion strategy.
    #[must_use]
    pub fn with_privileged_ledger(mut self, privileged: Arc<dyn PrivilegedLedger>) -> Self {
        self.privileged = Some(privileged);
        self
    }

    /// Cached product catalog.
    #[must_use]
    pub const fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Grouped, read-only view of the ledger.
    #[must_use]
    pub const fn view(&self) -> &LedgerView {
        &self.view
    }

    /// Drop cached products and ledger groupings.
    pub fn refresh(&self) {
        self.catalog.invalidate_all();
        self.view.invalidate();
    }

    /// Write each planned product in order, stopping at the first failure.
    async fn apply_inventory(
        &self,
        plan: Vec<PlannedProduct>,
    ) -> Result<Vec<PlannedProduct>, PartialApply> {
        let mut applied = Vec::with_capacity(plan.len());
        let mut pending = plan.into_iter();

        while let Some(planned) = pending.next() {
            if let Err(cause) = self.catalog.write_colors(&planned.after).await {
                error!(
                    product_id = %planned.after.id,
                    error = %cause,
                    applied = applied.len(),
                    "Inventory update failed"
                );
                let mut not_applied = vec![planned];
                not_applied.extend(pending);
                return Err(PartialApply {
                    applied,
                    not_applied,
                    cause,
                });
            }
            applied.push(planned);
        }

        Ok(applied)
    }

    /// Restore the preflight snapshot of every given product.
    async fn restore(&self, products: &[PlannedProduct]) -> RollbackReport {
        let mut report = RollbackReport::default();

        for planned in products {
            let id = planned.before.id;
            match self
                .catalog
                .restore_colors(id, &planned.before.colors)
                .await
            {
                Ok(()) => report.restored.push(id),
                Err(e) => {
                    error!(product_id = %id, error = %e, "Failed to restore inventory snapshot");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        if !report.is_complete() {
            warn!(
                failed = report.failed.len(),
                "Rollback incomplete; manual reconciliation required"
            );
        }
        report
    }
}

fn changes(plan: &[PlannedProduct]) -> Vec<ProductChange> {
    plan.iter().map(|p| p.change.clone()).collect()
}
