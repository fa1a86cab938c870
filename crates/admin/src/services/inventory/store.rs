//! Storage seams used by the engine.
//!
//! The engine only talks to these traits. `PostgreSQL` repositories in
//! [`crate::db`] implement them for production; the in-memory stores in
//! [`super::memory`] implement them for tests.

use async_trait::async_trait;
use thiserror::Error;

use bodega_core::{LedgerEntryId, PedidoId, ProductId};

use crate::db::RepositoryError;
use crate::models::ledger::{LedgerEntry, LedgerEntryUpdate};
use crate::models::product::{Product, ProductColor};
use crate::services::ledger_api::LedgerApiError;

/// A storage call failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The `PostgreSQL` repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The ledger HTTP API failed.
    #[error(transparent)]
    LedgerApi(#[from] LedgerApiError),

    /// The store is unreachable or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Products with per-color stock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Every product.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// The products with the given ids; unknown ids are simply absent.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Replace one product's color list.
    async fn update_colors(&self, id: ProductId, colors: &[ProductColor])
    -> Result<(), StoreError>;
}

/// The append-only movement ledger.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Insert all entries, all-or-nothing.
    async fn insert_entries(&self, entries: &[LedgerEntry]) -> Result<(), StoreError>;

    /// Rows with the given ids.
    async fn entries_by_ids(&self, ids: &[LedgerEntryId]) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Every row of one pedido, tombstoned rows included.
    async fn entries_for_pedido(&self, pedido_id: PedidoId)
    -> Result<Vec<LedgerEntry>, StoreError>;

    /// Every row.
    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Apply quantity/cost changes, all-or-nothing.
    async fn update_entries(&self, updates: &[LedgerEntryUpdate]) -> Result<(), StoreError>;

    /// Hard delete by id; returns rows removed.
    async fn delete_by_ids(&self, ids: &[LedgerEntryId]) -> Result<u64, StoreError>;

    /// Hard delete by group key; returns rows removed.
    async fn delete_by_pedido(&self, pedido_id: PedidoId) -> Result<u64, StoreError>;

    /// Zero the quantity and set the tombstone marker on rows matching the
    /// pedido or any id; returns rows marked.
    async fn tombstone(&self, pedido_id: PedidoId, ids: &[LedgerEntryId])
    -> Result<u64, StoreError>;
}

/// Deletion path that bypasses the regular store's write restrictions.
#[async_trait]
pub trait PrivilegedLedger: Send + Sync {
    /// Hard delete the given rows of one pedido; returns rows removed.
    async fn delete_entries(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, StoreError>;
}
