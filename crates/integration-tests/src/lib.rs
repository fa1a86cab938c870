//! Integration tests for Bodega.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bodega-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `scenarios` - Ingest, edit and delete of one pedido end to end
//! - `properties` - Stock invariants across operation sequences
//! - `sequences` - The same invariants over random sequences (proptest)
//! - `ledger_api` - The HTTP ledger endpoints through `LedgerApiClient`
//!
//! Every test runs over the in-memory stores; no database is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;

use bodega_admin::models::ledger::LedgerEntry;
use bodega_admin::services::inventory::memory::{
    MemoryInventory, MemoryLedger, MemoryPrivilegedLedger, sample_product,
};
use bodega_admin::services::inventory::{
    DEFAULT_CATALOG_TTL, DeleteRequest, EditRequest, EntryEdit, IngestRequest, InventoryEngine,
};
use bodega_core::{ColorKey, PedidoId, ProductId, QuantityInput};

pub const PRODUCT_A: ProductId = ProductId::new(1);
pub const PRODUCT_B: ProductId = ProductId::new(2);

/// Engine over in-memory stores seeded with two products.
///
/// Product A has `Red` (10 in stock, unit cost 10); product B has `Blue`
/// (4 in stock, unit cost 20).
pub struct TestContext {
    pub inventory: Arc<MemoryInventory>,
    pub ledger: Arc<MemoryLedger>,
    pub engine: InventoryEngine,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let inventory = Arc::new(MemoryInventory::default());
        inventory.insert(sample_product(1, "Product A", &[("Red", "#FF0000", 10)]));
        let mut b = sample_product(2, "Product B", &[("Blue", "#0000FF", 4)]);
        b.cost = Decimal::from(20);
        inventory.insert(b);

        let ledger = Arc::new(MemoryLedger::default());
        let engine = InventoryEngine::new(inventory.clone(), ledger.clone(), DEFAULT_CATALOG_TTL);

        Self {
            inventory,
            ledger,
            engine,
        }
    }

    /// Same stores, with the privileged deletion strategy enabled.
    #[must_use]
    pub fn with_privileged(self) -> (Self, Arc<MemoryPrivilegedLedger>) {
        let privileged = Arc::new(MemoryPrivilegedLedger::new(self.ledger.clone()));
        let engine = self.engine.with_privileged_ledger(privileged.clone());
        (Self { engine, ..self }, privileged)
    }

    /// Ingest 5 Red and 3 Blue, returning the new pedido.
    pub async fn ingest_standard(&self) -> PedidoId {
        let request = IngestRequest::new()
            .with(PRODUCT_A, key("#FF0000"), 5)
            .with(PRODUCT_B, key("#0000FF"), 3);
        self.engine.ingest(&request).await.unwrap().pedido_id
    }

    #[must_use]
    pub fn red(&self) -> i32 {
        self.inventory.stock(PRODUCT_A, "Red").unwrap()
    }

    #[must_use]
    pub fn blue(&self) -> i32 {
        self.inventory.stock(PRODUCT_B, "Blue").unwrap()
    }

    /// The stored entry of a pedido for one color.
    #[must_use]
    pub fn entry(&self, pedido_id: PedidoId, color: &str) -> LedgerEntry {
        self.ledger
            .entries_of(pedido_id)
            .into_iter()
            .find(|e| e.color_name == color)
            .unwrap()
    }

    /// Request changing one entry's quantity (and optionally its cost).
    #[must_use]
    pub fn edit(
        &self,
        pedido_id: PedidoId,
        color: &str,
        quantity: impl Into<QuantityInput>,
        cost: Option<&str>,
    ) -> EditRequest {
        EditRequest {
            pedido_id,
            changes: vec![EntryEdit {
                entry: self.entry(pedido_id, color),
                quantity: quantity.into(),
                cost: cost.map(str::to_string),
            }],
        }
    }

    /// Request deleting every stored entry of a pedido.
    #[must_use]
    pub fn delete(&self, pedido_id: PedidoId) -> DeleteRequest {
        DeleteRequest {
            pedido_id,
            entries: self.ledger.entries_of(pedido_id),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a hex color key.
#[must_use]
pub fn key(hex: &str) -> ColorKey {
    ColorKey::parse(hex).unwrap()
}
