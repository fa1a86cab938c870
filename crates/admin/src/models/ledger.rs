//! Stock ledger models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_core::{LedgerEntryId, PedidoId, ProductId, line_total};

/// One inbound stock movement.
///
/// Name, model, cost and price are snapshots taken when the pedido was
/// ingested and are never re-synced with the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    /// Group key shared by every entry created in one ingest.
    pub pedido_id: PedidoId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_model: String,
    /// Matched against `ProductColor::name` on edit and delete.
    pub color_name: String,
    pub quantity_added: i32,
    /// Unit cost at ingest time (edits may change it).
    pub cost: Decimal,
    /// Unit price at ingest time.
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    /// Set when the row was soft-deleted instead of removed.
    pub tombstoned_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Whether the row counts towards groupings and totals.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.tombstoned_at.is_none() && self.quantity_added > 0
    }

    /// `quantity_added × cost`.
    #[must_use]
    pub fn line_cost(&self) -> Decimal {
        line_total(self.quantity_added, self.cost)
    }

    /// `quantity_added × price`.
    #[must_use]
    pub fn line_price(&self) -> Decimal {
        line_total(self.quantity_added, self.price)
    }
}

/// A change to one ledger row, as carried by the batched update endpoint.
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryUpdate {
    pub id: LedgerEntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_added: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub cost: Option<Decimal>,
}

impl LedgerEntryUpdate {
    /// Whether the update changes anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity_added.is_none() && self.cost.is_none()
    }
}
