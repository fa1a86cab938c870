//! In-memory stores with failure injection, for tests.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! integration test crate.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use bodega_core::{ColorKey, LedgerEntryId, PedidoId, ProductId};

use super::store::{InventoryStore, PrivilegedLedger, StockLedger, StoreError};
use crate::db::RepositoryError;
use crate::models::ledger::{LedgerEntry, LedgerEntryUpdate};
use crate::models::product::{Product, ProductColor};

/// How an injected fault behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The call returns an error.
    Error,
    /// The call succeeds without touching any row.
    NoOp,
    /// The call succeeds after touching at most this many rows.
    Partial(usize),
}

impl Fault {
    /// Rows the call may touch; `None` when it fails outright.
    const fn limit(fault: Option<Self>) -> Option<usize> {
        match fault {
            None => Some(usize::MAX),
            Some(Self::Error) => None,
            Some(Self::NoOp) => Some(0),
            Some(Self::Partial(n)) => Some(n),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(call: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure in {call}"))
}

/// Build a product with the given `(name, hex, stock)` colors.
///
/// Cost is 10 and price 25.
///
/// # Panics
///
/// Panics if a hex key is malformed.
#[must_use]
pub fn sample_product(id: i32, name: &str, colors: &[(&str, &str, i32)]) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        model: format!("M-{id}"),
        category: "General".to_string(),
        price: Decimal::from(25),
        cost: Decimal::from(10),
        colors: colors
            .iter()
            .map(|(color, hex, stock)| ProductColor {
                name: (*color).to_string(),
                hex: ColorKey::parse(hex)
                    .unwrap_or_else(|e| panic!("invalid color key {hex:?}: {e}")),
                stock: *stock,
            })
            .collect(),
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Default)]
struct InventoryState {
    products: BTreeMap<ProductId, Product>,
    update_calls: usize,
    fail_reads: bool,
    fail_for: HashSet<ProductId>,
    /// Remaining successful updates before every update fails.
    fail_after: Option<usize>,
}

/// Product store held in memory.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    state: Mutex<InventoryState>,
}

impl MemoryInventory {
    /// Insert or replace a product.
    pub fn insert(&self, product: Product) {
        lock(&self.state).products.insert(product.id, product);
    }

    /// Current copy of a product.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        lock(&self.state).products.get(&id).cloned()
    }

    /// Stock of the first color with the given name.
    #[must_use]
    pub fn stock(&self, id: ProductId, color: &str) -> Option<i32> {
        lock(&self.state)
            .products
            .get(&id)?
            .colors
            .iter()
            .find(|c| c.name == color)
            .map(|c| c.stock)
    }

    /// Overwrite a color's stock without going through the engine, as an
    /// unrelated sale would.
    pub fn set_stock(&self, id: ProductId, color: &str, stock: i32) {
        let mut state = lock(&self.state);
        if let Some(c) = state
            .products
            .get_mut(&id)
            .and_then(|p| p.colors.iter_mut().find(|c| c.name == color))
        {
            c.stock = stock;
        }
    }

    /// Number of `update_colors` calls received, failed ones included.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        lock(&self.state).update_calls
    }

    /// Make every update of this product fail.
    pub fn fail_updates_for(&self, id: ProductId) {
        lock(&self.state).fail_for.insert(id);
    }

    /// Let `n` more updates succeed, then fail the rest.
    pub fn fail_updates_after(&self, n: usize) {
        lock(&self.state).fail_after = Some(n);
    }

    /// Make reads fail.
    pub fn fail_reads(&self, fail: bool) {
        lock(&self.state).fail_reads = fail;
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        let mut state = lock(&self.state);
        state.fail_reads = false;
        state.fail_for.clear();
        state.fail_after = None;
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = lock(&self.state);
        if state.fail_reads {
            return Err(injected("list_products"));
        }
        Ok(state.products.values().cloned().collect())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let state = lock(&self.state);
        if state.fail_reads {
            return Err(injected("get_products"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn update_colors(
        &self,
        id: ProductId,
        colors: &[ProductColor],
    ) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.update_calls += 1;

        if state.fail_for.contains(&id) {
            return Err(injected("update_colors"));
        }
        match &mut state.fail_after {
            Some(0) => return Err(injected("update_colors")),
            Some(n) => *n -= 1,
            None => {}
        }

        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        product.colors = colors.to_vec();
        Ok(())
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Default)]
struct LedgerFaults {
    insert: bool,
    update: bool,
    delete_by_ids: Option<Fault>,
    delete_by_pedido: Option<Fault>,
    tombstone: Option<Fault>,
    privileged: Option<Fault>,
}

#[derive(Debug, Default)]
struct LedgerState {
    rows: Vec<LedgerEntry>,
    faults: LedgerFaults,
}

impl LedgerState {
    /// Remove up to `limit` rows matching `doomed`.
    fn remove(&mut self, limit: usize, doomed: impl Fn(&LedgerEntry) -> bool) -> u64 {
        let mut removed = 0;
        self.rows.retain(|r| {
            if removed < limit && doomed(r) {
                removed += 1;
                false
            } else {
                true
            }
        });
        u64::try_from(removed).unwrap_or(u64::MAX)
    }
}

/// Stock ledger held in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// Append rows without going through the engine.
    pub fn seed(&self, entries: Vec<LedgerEntry>) {
        lock(&self.state).rows.extend(entries);
    }

    /// Every stored row, tombstoned ones included.
    #[must_use]
    pub fn rows(&self) -> Vec<LedgerEntry> {
        lock(&self.state).rows.clone()
    }

    /// Every stored row of one pedido.
    #[must_use]
    pub fn entries_of(&self, pedido_id: PedidoId) -> Vec<LedgerEntry> {
        lock(&self.state)
            .rows
            .iter()
            .filter(|r| r.pedido_id == pedido_id)
            .cloned()
            .collect()
    }

    /// Make bulk inserts fail.
    pub fn fail_inserts(&self) {
        lock(&self.state).faults.insert = true;
    }

    /// Make batched updates fail.
    pub fn fail_updates(&self) {
        lock(&self.state).faults.update = true;
    }

    /// Inject a fault into delete-by-id.
    pub fn fail_delete_by_ids(&self, fault: Fault) {
        lock(&self.state).faults.delete_by_ids = Some(fault);
    }

    /// Inject a fault into delete-by-pedido.
    pub fn fail_delete_by_pedido(&self, fault: Fault) {
        lock(&self.state).faults.delete_by_pedido = Some(fault);
    }

    /// Inject a fault into tombstoning.
    pub fn fail_tombstone(&self, fault: Fault) {
        lock(&self.state).faults.tombstone = Some(fault);
    }

    /// Inject a fault into the privileged deletion path.
    pub fn fail_privileged(&self, fault: Fault) {
        lock(&self.state).faults.privileged = Some(fault);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        lock(&self.state).faults = LedgerFaults::default();
    }
}

#[async_trait]
impl StockLedger for MemoryLedger {
    async fn insert_entries(&self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.faults.insert {
            return Err(injected("insert_entries"));
        }
        state.rows.extend_from_slice(entries);
        Ok(())
    }

    async fn entries_by_ids(&self, ids: &[LedgerEntryId]) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(lock(&self.state)
            .rows
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn entries_for_pedido(
        &self,
        pedido_id: PedidoId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.entries_of(pedido_id))
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.rows())
    }

    async fn update_entries(&self, updates: &[LedgerEntryUpdate]) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.faults.update {
            return Err(injected("update_entries"));
        }

        // All-or-nothing: check every target before changing any.
        for update in updates {
            let live = state
                .rows
                .iter()
                .any(|r| r.id == update.id && r.tombstoned_at.is_none());
            if !live {
                return Err(RepositoryError::NotFound(format!("ledger entry {}", update.id)).into());
            }
        }
        for update in updates {
            if let Some(row) = state.rows.iter_mut().find(|r| r.id == update.id) {
                if let Some(quantity) = update.quantity_added {
                    row.quantity_added = quantity;
                }
                if let Some(cost) = update.cost {
                    row.cost = cost;
                }
            }
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[LedgerEntryId]) -> Result<u64, StoreError> {
        let mut state = lock(&self.state);
        match Fault::limit(state.faults.delete_by_ids) {
            None => Err(injected("delete_by_ids")),
            Some(limit) => Ok(state.remove(limit, |r| ids.contains(&r.id))),
        }
    }

    async fn delete_by_pedido(&self, pedido_id: PedidoId) -> Result<u64, StoreError> {
        let mut state = lock(&self.state);
        match Fault::limit(state.faults.delete_by_pedido) {
            None => Err(injected("delete_by_pedido")),
            Some(limit) => Ok(state.remove(limit, |r| r.pedido_id == pedido_id)),
        }
    }

    async fn tombstone(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, StoreError> {
        let mut state = lock(&self.state);
        let Some(limit) = Fault::limit(state.faults.tombstone) else {
            return Err(injected("tombstone"));
        };

        let now = Utc::now();
        let mut marked = 0;
        for row in state
            .rows
            .iter_mut()
            .filter(|r| r.tombstoned_at.is_none())
            .filter(|r| r.pedido_id == pedido_id || ids.contains(&r.id))
            .take(limit)
        {
            row.quantity_added = 0;
            row.tombstoned_at = Some(now);
            marked += 1;
        }
        Ok(marked)
    }
}

/// Privileged deletion path over a [`MemoryLedger`].
#[derive(Debug)]
pub struct MemoryPrivilegedLedger {
    ledger: Arc<MemoryLedger>,
    calls: Mutex<usize>,
}

impl MemoryPrivilegedLedger {
    /// Delete through `ledger`; faults are injected with
    /// [`MemoryLedger::fail_privileged`].
    #[must_use]
    pub const fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            ledger,
            calls: Mutex::new(0),
        }
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl PrivilegedLedger for MemoryPrivilegedLedger {
    async fn delete_entries(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, StoreError> {
        *lock(&self.calls) += 1;

        let mut state = lock(&self.ledger.state);
        match Fault::limit(state.faults.privileged) {
            None => Err(injected("privileged delete")),
            Some(limit) => Ok(state.remove(limit, |r| {
                r.pedido_id == pedido_id && ids.contains(&r.id)
            })),
        }
    }
}
