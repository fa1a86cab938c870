//! Read-side grouping of ledger rows into pedidos.
//!
//! Tombstoned and zero-quantity rows are excluded from both grouping and
//! totals. Reporting code must read the ledger through this view.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Serialize;

use bodega_core::PedidoId;

use super::store::{StockLedger, StoreError};
use crate::models::ledger::LedgerEntry;

/// Aggregates over a pedido's visible entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PedidoTotals {
    pub units: i64,
    /// Σ quantity × cost.
    pub cost: Decimal,
    /// Σ quantity × price.
    pub price: Decimal,
    pub entry_count: usize,
}

impl PedidoTotals {
    fn add(&mut self, entry: &LedgerEntry) {
        self.units += i64::from(entry.quantity_added);
        self.cost += entry.line_cost();
        self.price += entry.line_price();
        self.entry_count += 1;
    }
}

/// Ledger rows sharing one `pedido_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pedido {
    pub pedido_id: PedidoId,
    /// Newest entry timestamp.
    pub created_at: DateTime<Utc>,
    pub entries: Vec<LedgerEntry>,
    pub totals: PedidoTotals,
}

/// Totals across every visible pedido.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub pedidos: usize,
    pub entries: usize,
    pub units: i64,
    pub cost: Decimal,
    pub price: Decimal,
}

impl LedgerSummary {
    /// Sum the totals of the given pedidos.
    #[must_use]
    pub fn of(pedidos: &[Pedido]) -> Self {
        pedidos.iter().fold(Self::default(), |mut acc, p| {
            acc.pedidos += 1;
            acc.entries += p.totals.entry_count;
            acc.units += p.totals.units;
            acc.cost += p.totals.cost;
            acc.price += p.totals.price;
            acc
        })
    }
}

/// Group visible rows by pedido, newest pedido first.
///
/// Entries within a pedido keep creation order. Pedidos with the same
/// timestamp are ordered by id so the output is stable.
#[must_use]
pub fn group_entries(entries: &[LedgerEntry]) -> Vec<Pedido> {
    let mut groups: HashMap<PedidoId, Pedido> = HashMap::new();

    for entry in entries.iter().filter(|e| e.is_visible()) {
        let pedido = groups.entry(entry.pedido_id).or_insert_with(|| Pedido {
            pedido_id: entry.pedido_id,
            created_at: entry.created_at,
            entries: Vec::new(),
            totals: PedidoTotals::default(),
        });
        pedido.created_at = pedido.created_at.max(entry.created_at);
        pedido.totals.add(entry);
        pedido.entries.push(entry.clone());
    }

    let mut pedidos: Vec<Pedido> = groups.into_values().collect();
    for pedido in &mut pedidos {
        pedido
            .entries
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    pedidos.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(a.pedido_id.cmp(&b.pedido_id))
    });
    pedidos
}

/// Cached, grouped view of the stock ledger.
#[derive(Clone)]
pub struct LedgerView {
    ledger: Arc<dyn StockLedger>,
    history: Cache<(), Arc<Vec<Pedido>>>,
}

impl LedgerView {
    /// Create a view over `ledger` caching the grouped history for `ttl`.
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>, ttl: Duration) -> Self {
        Self {
            ledger,
            history: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Every visible pedido, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the ledger cannot be read.
    pub async fn history(&self) -> Result<Arc<Vec<Pedido>>, StoreError> {
        if let Some(history) = self.history.get(&()).await {
            return Ok(history);
        }

        let history = Arc::new(group_entries(&self.ledger.list_entries().await?));
        self.history.insert((), Arc::clone(&history)).await;
        Ok(history)
    }

    /// One pedido read straight from the ledger; `None` if it has no visible
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the ledger cannot be read.
    pub async fn pedido(&self, pedido_id: PedidoId) -> Result<Option<Pedido>, StoreError> {
        let entries = self.ledger.entries_for_pedido(pedido_id).await?;
        Ok(group_entries(&entries).into_iter().next())
    }

    /// Totals across the cached history.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the ledger cannot be read.
    pub async fn summary(&self) -> Result<LedgerSummary, StoreError> {
        Ok(LedgerSummary::of(&self.history().await?))
    }

    /// Drop the cached history.
    pub fn invalidate(&self) {
        self.history.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use bodega_core::{LedgerEntryId, ProductId};

    use super::*;
    use crate::services::inventory::memory::MemoryLedger;

    fn entry(pedido: PedidoId, minute: u32, quantity: i32, cost: i64) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::generate(),
            pedido_id: pedido,
            product_id: ProductId::new(1),
            product_name: "Mochila".to_string(),
            product_model: "M-20".to_string(),
            color_name: "Rojo".to_string(),
            quantity_added: quantity,
            cost: Decimal::from(cost),
            price: Decimal::from(cost * 2),
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, minute, 0).unwrap(),
            tombstoned_at: None,
        }
    }

    #[test]
    fn test_group_entries_newest_first_with_totals() {
        let older = PedidoId::generate();
        let newer = PedidoId::generate();
        let rows = vec![
            entry(older, 0, 5, 10),
            entry(newer, 30, 1, 7),
            entry(older, 1, 3, 20),
        ];

        let pedidos = group_entries(&rows);
        assert_eq!(pedidos.len(), 2);
        assert_eq!(pedidos[0].pedido_id, newer);
        assert_eq!(pedidos[1].pedido_id, older);

        let totals = &pedidos[1].totals;
        assert_eq!(totals.units, 8);
        assert_eq!(totals.cost, Decimal::from(110));
        assert_eq!(totals.price, Decimal::from(220));
        assert_eq!(totals.entry_count, 2);
    }

    #[test]
    fn test_group_entries_excludes_invisible_rows() {
        let pedido = PedidoId::generate();
        let gone = PedidoId::generate();
        let mut tombstoned = entry(gone, 5, 0, 10);
        tombstoned.tombstoned_at = Some(Utc::now());
        let rows = vec![entry(pedido, 0, 2, 10), entry(pedido, 1, 0, 99), tombstoned];

        let pedidos = group_entries(&rows);
        assert_eq!(pedidos.len(), 1);
        assert_eq!(pedidos[0].entries.len(), 1);
        assert_eq!(pedidos[0].totals.cost, Decimal::from(20));

        let summary = LedgerSummary::of(&pedidos);
        assert_eq!(summary.pedidos, 1);
        assert_eq!(summary.units, 2);
    }

    #[tokio::test]
    async fn test_history_is_cached_until_invalidated() {
        let ledger = Arc::new(MemoryLedger::default());
        let pedido = PedidoId::generate();
        ledger.seed(vec![entry(pedido, 0, 2, 10)]);
        let view = LedgerView::new(ledger.clone(), Duration::from_secs(60));

        assert_eq!(view.history().await.unwrap().len(), 1);

        ledger.seed(vec![entry(PedidoId::generate(), 10, 1, 10)]);
        assert_eq!(view.history().await.unwrap().len(), 1);

        view.invalidate();
        assert_eq!(view.history().await.unwrap().len(), 2);
        assert_eq!(view.summary().await.unwrap().units, 3);
    }

    #[tokio::test]
    async fn test_pedido_lookup() {
        let ledger = Arc::new(MemoryLedger::default());
        let pedido = PedidoId::generate();
        ledger.seed(vec![entry(pedido, 0, 2, 10), entry(pedido, 1, 4, 10)]);
        let view = LedgerView::new(ledger, Duration::from_secs(60));

        let found = view.pedido(pedido).await.unwrap().unwrap();
        assert_eq!(found.totals.units, 6);
        assert!(view.pedido(PedidoId::generate()).await.unwrap().is_none());
    }
}
