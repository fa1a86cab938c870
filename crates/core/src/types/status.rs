//! Status enums for ledger operations.

use serde::{Deserialize, Serialize};

/// Ledger removal strategy used when deleting a pedido.
///
/// Strategies are attempted in declaration order; the first one that
/// removes the pedido's rows wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Hard delete by entry ids through the privileged ledger endpoint.
    PrivilegedById,
    /// Hard delete by entry ids with the regular store credentials.
    ById,
    /// Hard delete of every row sharing the pedido id.
    ByPedido,
    /// Soft delete: zero the quantity and set the tombstone marker.
    Tombstone,
}

impl DeleteStrategy {
    /// All strategies in the order they are attempted.
    pub const ESCALATION: [Self; 4] = [
        Self::PrivilegedById,
        Self::ById,
        Self::ByPedido,
        Self::Tombstone,
    ];

    /// Whether the strategy leaves tombstoned rows behind instead of
    /// removing them.
    #[must_use]
    pub const fn is_soft(self) -> bool {
        matches!(self, Self::Tombstone)
    }

    /// Stable name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrivilegedById => "privileged_by_id",
            Self::ById => "by_id",
            Self::ByPedido => "by_pedido",
            Self::Tombstone => "tombstone",
        }
    }
}

impl std::fmt::Display for DeleteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the pedido delete saga.
///
/// ```text
/// Pending -> Reversed -> LedgerDeleted    -> Done
///                     -> LedgerTombstoned -> Done
///                     -> RolledBack
/// Pending -> RolledBack   (reversal failed part way)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePhase {
    /// Preflight passed, nothing mutated yet.
    Pending,
    /// Inventory reversal applied to every affected product.
    Reversed,
    /// Ledger rows hard-deleted.
    LedgerDeleted,
    /// Ledger rows tombstoned.
    LedgerTombstoned,
    /// Views invalidated, operation complete.
    Done,
    /// Inventory restored after a failed reversal or ledger removal.
    RolledBack,
}

impl DeletePhase {
    /// Whether `next` is a legal successor of this phase.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Reversed | Self::RolledBack)
                | (
                    Self::Reversed,
                    Self::LedgerDeleted | Self::LedgerTombstoned | Self::RolledBack
                )
                | (Self::LedgerDeleted | Self::LedgerTombstoned, Self::Done)
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::RolledBack)
    }

    /// Stable name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reversed => "reversed",
            Self::LedgerDeleted => "ledger_deleted",
            Self::LedgerTombstoned => "ledger_tombstoned",
            Self::Done => "done",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for DeletePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
