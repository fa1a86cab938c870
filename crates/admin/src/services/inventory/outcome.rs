//! Structured results of engine operations.
//!
//! Every operation returns either a success report or an [`OperationError`].
//! Errors raised after validation carry a [`MutationReport`] that states which
//! products were changed and which were not, so an operator can reconcile by
//! hand when no automatic rollback happened.

use std::fmt;

use thiserror::Error;

use bodega_core::{
    ColorKey, CostError, DeletePhase, DeleteStrategy, LedgerEntryId, PedidoId, ProductId,
    QuantityError,
};

use super::store::StoreError;

// =============================================================================
// Validation
// =============================================================================

/// What is wrong with one input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueKind {
    #[error("product not found")]
    UnknownProduct,

    #[error("color {0:?} not found on product")]
    UnknownColor(String),

    #[error("color {color:?} matches {matches} variants")]
    AmbiguousColor { color: String, matches: usize },

    #[error("insufficient stock: {current} on hand, {required} required (short by {shortfall})")]
    InsufficientStock {
        current: i32,
        required: i64,
        shortfall: i64,
    },

    #[error(transparent)]
    InvalidQuantity(QuantityError),

    #[error(transparent)]
    InvalidCost(CostError),

    #[error("entry belongs to pedido {0}")]
    PedidoMismatch(PedidoId),

    #[error("entry listed more than once")]
    DuplicateEntry,

    #[error("entry was soft-deleted")]
    EntryTombstoned,

    #[error("stock would overflow ({current} on hand, adding {added})")]
    StockOverflow { current: i32, added: i64 },

    #[error("no positive quantities requested")]
    NothingRequested,

    #[error("pedido has no entries")]
    EmptyPedido,
}

/// A validation failure tied to the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub entry_id: Option<LedgerEntryId>,
    pub product_id: Option<ProductId>,
    /// Human-readable label of the offending line (e.g. `"Mochila M-20 / Rojo"`).
    pub subject: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    pub(crate) fn new(subject: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            entry_id: None,
            product_id: None,
            subject: subject.into(),
            kind,
        }
    }

    pub(crate) const fn with_entry(mut self, id: LedgerEntryId) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub(crate) const fn with_product(mut self, id: ProductId) -> Self {
        self.product_id = Some(id);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.kind)
    }
}

// =============================================================================
// Ingest skips
// =============================================================================

/// Why an ingest line was left out of the pedido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownProduct,
    UnknownColor,
    AmbiguousColor(usize),
}

impl SkipReason {
    pub(crate) fn into_issue_kind(self, color: &ColorKey) -> IssueKind {
        match self {
            Self::UnknownProduct => IssueKind::UnknownProduct,
            Self::UnknownColor => IssueKind::UnknownColor(color.to_string()),
            Self::AmbiguousColor(matches) => IssueKind::AmbiguousColor {
                color: color.to_string(),
                matches,
            },
        }
    }
}

/// An ingest line that did not resolve to a product color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub product_id: ProductId,
    pub color_key: ColorKey,
    pub quantity: i32,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "product {} / {} ({} units): {}",
            self.product_id,
            self.color_key,
            self.quantity,
            self.reason.into_issue_kind(&self.color_key)
        )
    }
}

// =============================================================================
// Stock changes
// =============================================================================

/// Net stock change applied (or planned) for one color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorChange {
    pub color_name: String,
    pub delta: i32,
}

/// Stock changes for one product, written by a single inventory update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductChange {
    pub product_id: ProductId,
    pub product_name: String,
    pub colors: Vec<ColorChange>,
}

impl fmt::Display for ProductChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.product_name, self.product_id)?;
        for (i, color) in self.colors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{sep}{} {:+}", color.color_name, color.delta)?;
        }
        Ok(())
    }
}

// =============================================================================
// Delete strategies
// =============================================================================

/// Result of one ledger-removal strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy completed removal (rows affected by this attempt).
    Removed(u64),
    /// The call succeeded but left rows behind.
    Incomplete { removed: u64, expected: u64 },
    /// The call failed.
    Failed(String),
    /// The strategy is not configured.
    Unavailable,
}

/// One entry of the strategy escalation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: DeleteStrategy,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Removed(n) => write!(f, "{}: removed {n}", self.strategy),
            AttemptOutcome::Incomplete { removed, expected } => {
                write!(f, "{}: removed {removed} of {expected}", self.strategy)
            }
            AttemptOutcome::Failed(cause) => write!(f, "{}: failed ({cause})", self.strategy),
            AttemptOutcome::Unavailable => write!(f, "{}: not configured", self.strategy),
        }
    }
}

// =============================================================================
// Failures after validation
// =============================================================================

/// The engine operation a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ingest,
    Edit,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ingest => "ingest",
            Self::Edit => "edit",
            Self::Delete => "delete",
        })
    }
}

/// The storage step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    LedgerInsert,
    InventoryUpdate,
    LedgerUpdate,
    LedgerRemoval,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LedgerInsert => "ledger insert",
            Self::InventoryUpdate => "inventory update",
            Self::LedgerUpdate => "ledger update",
            Self::LedgerRemoval => "ledger removal",
        })
    }
}

/// Result of restoring inventory snapshots after a failed delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub restored: Vec<ProductId>,
    /// Products whose snapshot could not be written back, with the cause.
    pub failed: Vec<(ProductId, String)>,
}

impl RollbackReport {
    /// Whether every snapshot was restored.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What happened when a storage call failed after validation passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub operation: Operation,
    pub pedido_id: PedidoId,
    pub stage: MutationStage,
    pub cause: String,
    /// Inventory updates that were written and are still in place.
    pub inventory_applied: Vec<ProductChange>,
    /// Inventory updates that were never written (or were rolled back).
    pub inventory_not_applied: Vec<ProductChange>,
    /// Whether ledger rows for this operation were written, or for deletes,
    /// whether any were removed.
    pub ledger_written: bool,
    /// Present only for deletes, which restore inventory on failure.
    pub rollback: Option<RollbackReport>,
    pub attempts: Vec<StrategyAttempt>,
}

impl MutationReport {
    pub(crate) fn new(
        operation: Operation,
        pedido_id: PedidoId,
        stage: MutationStage,
        cause: impl fmt::Display,
    ) -> Self {
        Self {
            operation,
            pedido_id,
            stage,
            cause: cause.to_string(),
            inventory_applied: Vec::new(),
            inventory_not_applied: Vec::new(),
            ledger_written: false,
            rollback: None,
            attempts: Vec::new(),
        }
    }

    /// Whether the two stores may now disagree and need manual reconciliation.
    #[must_use]
    pub fn needs_reconciliation(&self) -> bool {
        match &self.rollback {
            Some(rollback) => !rollback.is_complete() || self.ledger_written,
            None if self.ledger_written => !self.inventory_not_applied.is_empty(),
            None => !self.inventory_applied.is_empty(),
        }
    }
}

impl fmt::Display for MutationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of pedido {} failed during {}: {}",
            self.operation, self.pedido_id, self.stage, self.cause
        )
    }
}

// =============================================================================
// Operation boundary
// =============================================================================

/// Error returned by every engine operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Rejected before any write.
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// A write failed after validation; see the report for what was changed.
    #[error("{0}")]
    Mutation(Box<MutationReport>),

    /// Current state could not be read; nothing was written.
    #[error("could not read current state: {0}")]
    Unavailable(#[from] StoreError),
}

impl OperationError {
    pub(crate) fn validation(issue: ValidationIssue) -> Self {
        Self::Validation(vec![issue])
    }

    pub(crate) fn mutation(report: MutationReport) -> Self {
        Self::Mutation(Box::new(report))
    }

    /// Validation issues, if this is a validation failure.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation(issues) => issues,
            _ => &[],
        }
    }

    /// Mutation report, if a write failed.
    #[must_use]
    pub fn report(&self) -> Option<&MutationReport> {
        match self {
            Self::Mutation(report) => Some(report),
            _ => None,
        }
    }
}

// =============================================================================
// Success reports
// =============================================================================

/// A new pedido was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub pedido_id: PedidoId,
    pub entry_count: usize,
    pub units_added: i64,
    pub skipped: Vec<SkippedItem>,
    pub inventory: Vec<ProductChange>,
}

/// Entries of a pedido were edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub pedido_id: PedidoId,
    pub entries_changed: usize,
    pub inventory: Vec<ProductChange>,
}

/// Result of an edit that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied(EditReport),
    /// Every quantity and cost already matched; nothing was written.
    NothingToChange { pedido_id: PedidoId },
}

/// A pedido was reversed and removed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub pedido_id: PedidoId,
    pub units_reversed: i64,
    /// The strategy that completed removal.
    pub strategy: DeleteStrategy,
    /// Every phase the deletion passed through, starting at `Pending`.
    pub phases: Vec<DeletePhase>,
    pub attempts: Vec<StrategyAttempt>,
    pub inventory: Vec<ProductChange>,
}

impl DeleteReport {
    /// Whether the rows were soft-deleted rather than removed.
    #[must_use]
    pub const fn tombstoned(&self) -> bool {
        self.strategy.is_soft()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(
            "Mochila M-20 / Azul",
            IssueKind::InsufficientStock {
                current: 1,
                required: 3,
                shortfall: 2,
            },
        );
        assert_eq!(
            issue.to_string(),
            "Mochila M-20 / Azul: insufficient stock: 1 on hand, 3 required (short by 2)"
        );
    }

    #[test]
    fn test_product_change_display() {
        let change = ProductChange {
            product_id: ProductId::new(7),
            product_name: "Mochila".to_string(),
            colors: vec![
                ColorChange {
                    color_name: "Rojo".to_string(),
                    delta: 5,
                },
                ColorChange {
                    color_name: "Azul".to_string(),
                    delta: -2,
                },
            ],
        };
        assert_eq!(change.to_string(), "Mochila (#7): Rojo +5, Azul -2");
    }

    #[test]
    fn test_reconciliation_flag() {
        let pedido = PedidoId::generate();
        let change = ProductChange {
            product_id: ProductId::new(1),
            product_name: "Mochila".to_string(),
            colors: Vec::new(),
        };

        // Ledger insert failed, nothing else written.
        let mut report =
            MutationReport::new(Operation::Ingest, pedido, MutationStage::LedgerInsert, "down");
        report.inventory_not_applied.push(change.clone());
        assert!(!report.needs_reconciliation());

        // Ledger written, one inventory update missing.
        report.stage = MutationStage::InventoryUpdate;
        report.ledger_written = true;
        assert!(report.needs_reconciliation());

        // Delete rolled back cleanly.
        let mut report =
            MutationReport::new(Operation::Delete, pedido, MutationStage::LedgerRemoval, "down");
        report.rollback = Some(RollbackReport {
            restored: vec![ProductId::new(1)],
            failed: Vec::new(),
        });
        assert!(!report.needs_reconciliation());

        // Delete removed some rows before giving up.
        report.ledger_written = true;
        assert!(report.needs_reconciliation());
    }
}
