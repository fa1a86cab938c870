//! Batch ingest: turn requested quantities into one new pedido.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use bodega_core::{ColorKey, LedgerEntryId, PedidoId, ProductId, QuantityInput};

use super::outcome::{
    IngestReport, IssueKind, MutationReport, MutationStage, Operation, OperationError,
    SkipReason, SkippedItem, ValidationIssue,
};
use super::plan::{StockPlan, units_added};
use super::{InventoryEngine, changes};
use crate::models::ledger::LedgerEntry;
use crate::models::product::ColorMatch;

/// One requested line as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLine {
    pub product_id: ProductId,
    pub color_key: ColorKey,
    pub quantity: QuantityInput,
}

/// Requested quantities keyed by product and color key.
///
/// Serialized as a list of [`IngestLine`]s; a later line for the same
/// product and color replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IngestLine>", into = "Vec<IngestLine>")]
pub struct IngestRequest {
    lines: BTreeMap<(ProductId, ColorKey), QuantityInput>,
}

impl IngestRequest {
    /// Create an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested quantity for one product color.
    #[must_use]
    pub fn with(
        mut self,
        product_id: ProductId,
        color_key: ColorKey,
        quantity: impl Into<QuantityInput>,
    ) -> Self {
        self.lines.insert((product_id, color_key), quantity.into());
        self
    }

    /// Number of lines, including blank ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the request has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<Vec<IngestLine>> for IngestRequest {
    fn from(lines: Vec<IngestLine>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|l| ((l.product_id, l.color_key), l.quantity))
                .collect(),
        }
    }
}

impl From<IngestRequest> for Vec<IngestLine> {
    fn from(request: IngestRequest) -> Self {
        request
            .lines
            .into_iter()
            .map(|((product_id, color_key), quantity)| IngestLine {
                product_id,
                color_key,
                quantity,
            })
            .collect()
    }
}

struct Resolved {
    product_id: ProductId,
    color: usize,
    quantity: i32,
}

impl InventoryEngine {
    /// Write a new pedido for the requested quantities and increment stock.
    ///
    /// Blank and non-positive quantities are ignored. Lines whose product or
    /// color cannot be resolved are skipped and listed in the report; if
    /// every line is skipped nothing is written.
    ///
    /// Ledger rows are inserted first, all-or-nothing. Inventory is then
    /// updated one product at a time; a failure there leaves earlier
    /// products incremented and is reported, not rolled back.
    ///
    /// # Errors
    ///
    /// - `OperationError::Validation` for malformed quantities, nothing
    ///   requested, stock overflow, or every line skipped
    /// - `OperationError::Unavailable` if products cannot be read
    /// - `OperationError::Mutation` if a write fails
    #[instrument(skip(self, request), fields(lines = request.len()))]
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestReport, OperationError> {
        let mut issues = Vec::new();
        let mut requested = Vec::new();

        for ((product_id, color_key), quantity) in &request.lines {
            match quantity.requested() {
                Ok(Some(qty)) => requested.push((*product_id, color_key, qty)),
                Ok(None) => {}
                Err(e) => issues.push(
                    ValidationIssue::new(
                        format!("product {product_id} / {color_key}"),
                        IssueKind::InvalidQuantity(e),
                    )
                    .with_product(*product_id),
                ),
            }
        }
        if !issues.is_empty() {
            return Err(OperationError::Validation(issues));
        }
        if requested.is_empty() {
            return Err(OperationError::validation(ValidationIssue::new(
                "request",
                IssueKind::NothingRequested,
            )));
        }

        let ids: Vec<ProductId> = requested.iter().map(|(id, _, _)| *id).collect();
        let products = self.catalog.load_fresh(&ids).await?;

        let mut plan = StockPlan::default();
        let mut resolved = Vec::with_capacity(requested.len());
        let mut skipped = Vec::new();

        for (product_id, color_key, quantity) in requested {
            let skip = |reason| SkippedItem {
                product_id,
                color_key: color_key.clone(),
                quantity,
                reason,
            };
            let Some(product) = products.get(&product_id) else {
                skipped.push(skip(SkipReason::UnknownProduct));
                continue;
            };
            let color = match product.match_color_by_key(color_key) {
                ColorMatch::Found(index) => index,
                ColorMatch::Missing => {
                    skipped.push(skip(SkipReason::UnknownColor));
                    continue;
                }
                ColorMatch::Ambiguous(n) => {
                    skipped.push(skip(SkipReason::AmbiguousColor(n)));
                    continue;
                }
            };

            if let Err(kind) = plan.add(product, color, i64::from(quantity)) {
                issues.push(
                    ValidationIssue::new(format!("{} / {color_key}", product.label()), kind)
                        .with_product(product_id),
                );
                continue;
            }
            resolved.push(Resolved {
                product_id,
                color,
                quantity,
            });
        }

        if !issues.is_empty() {
            return Err(OperationError::Validation(issues));
        }
        if resolved.is_empty() {
            warn!(skipped = skipped.len(), "Every ingest line was skipped");
            return Err(OperationError::Validation(
                skipped
                    .iter()
                    .map(|s| {
                        ValidationIssue::new(
                            format!("product {} / {}", s.product_id, s.color_key),
                            s.reason.into_issue_kind(&s.color_key),
                        )
                        .with_product(s.product_id)
                    })
                    .collect(),
            ));
        }

        let pedido_id = PedidoId::generate();
        let created_at = Utc::now();
        let entries: Vec<LedgerEntry> = resolved
            .iter()
            .filter_map(|r| {
                let product = products.get(&r.product_id)?;
                let color = product.colors.get(r.color)?;
                Some(LedgerEntry {
                    id: LedgerEntryId::generate(),
                    pedido_id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_model: product.model.clone(),
                    color_name: color.name.clone(),
                    quantity_added: r.quantity,
                    cost: product.cost,
                    price: product.price,
                    created_at,
                    tombstoned_at: None,
                })
            })
            .collect();

        let plan = plan.build();

        if let Err(e) = self.ledger.insert_entries(&entries).await {
            let mut report =
                MutationReport::new(Operation::Ingest, pedido_id, MutationStage::LedgerInsert, &e);
            report.inventory_not_applied = changes(&plan);
            return Err(OperationError::mutation(report));
        }

        let applied = match self.apply_inventory(plan).await {
            Ok(applied) => applied,
            Err(partial) => {
                self.refresh();
                let mut report = MutationReport::new(
                    Operation::Ingest,
                    pedido_id,
                    MutationStage::InventoryUpdate,
                    &partial.cause,
                );
                report.ledger_written = true;
                report.inventory_applied = changes(&partial.applied);
                report.inventory_not_applied = changes(&partial.not_applied);
                return Err(OperationError::mutation(report));
            }
        };

        self.refresh();

        let report = IngestReport {
            pedido_id,
            entry_count: entries.len(),
            units_added: units_added(&applied),
            skipped,
            inventory: changes(&applied),
        };
        info!(
            %pedido_id,
            entries = report.entry_count,
            units = report.units_added,
            skipped = report.skipped.len(),
            "Pedido ingested"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::inventory::DEFAULT_CATALOG_TTL;
    use crate::services::inventory::memory::{MemoryInventory, MemoryLedger, sample_product};

    fn key(s: &str) -> ColorKey {
        ColorKey::parse(s).unwrap()
    }

    fn setup() -> (Arc<MemoryInventory>, Arc<MemoryLedger>, InventoryEngine) {
        let inventory = Arc::new(MemoryInventory::default());
        inventory.insert(sample_product(
            1,
            "Mochila",
            &[("Rojo", "#ff0000", 1), ("Azul", "#0000ff", 0)],
        ));
        inventory.insert(sample_product(2, "Bolso", &[("Azul", "#0000ff", 2)]));
        let ledger = Arc::new(MemoryLedger::default());
        let engine = InventoryEngine::new(inventory.clone(), ledger.clone(), DEFAULT_CATALOG_TTL);
        (inventory, ledger, engine)
    }

    #[tokio::test]
    async fn test_ingest_writes_pedido_and_stock() {
        let (inventory, ledger, engine) = setup();
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#FF0000"), 5)
            .with(ProductId::new(1), key("#0000ff"), "2")
            .with(ProductId::new(2), key("#0000ff"), 3);

        let report = engine.ingest(&request).await.unwrap();

        assert_eq!(report.entry_count, 3);
        assert_eq!(report.units_added, 10);
        assert!(report.skipped.is_empty());
        // One inventory write per product.
        assert_eq!(inventory.update_calls(), 2);
        assert_eq!(inventory.stock(ProductId::new(1), "Rojo"), Some(6));
        assert_eq!(inventory.stock(ProductId::new(1), "Azul"), Some(2));
        assert_eq!(inventory.stock(ProductId::new(2), "Azul"), Some(5));

        let rows = ledger.rows();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.pedido_id == report.pedido_id));
        let rojo = rows.iter().find(|r| r.color_name == "Rojo").unwrap();
        assert_eq!(rojo.product_name, "Mochila");
        assert_eq!(rojo.cost, sample_product(1, "", &[]).cost);
    }

    #[tokio::test]
    async fn test_ingest_ignores_blank_and_non_positive() {
        let (inventory, ledger, engine) = setup();
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#ff0000"), " ")
            .with(ProductId::new(1), key("#0000ff"), 0)
            .with(ProductId::new(2), key("#0000ff"), -4);

        let err = engine.ingest(&request).await.unwrap_err();
        assert_eq!(err.issues()[0].kind, IssueKind::NothingRequested);
        assert!(ledger.rows().is_empty());
        assert_eq!(inventory.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_ingest_malformed_quantity_aborts() {
        let (_, ledger, engine) = setup();
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#ff0000"), 5)
            .with(ProductId::new(2), key("#0000ff"), "abc");

        let err = engine.ingest(&request).await.unwrap_err();
        assert!(matches!(
            err.issues()[0].kind,
            IssueKind::InvalidQuantity(_)
        ));
        assert!(ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_skips_unresolved_lines() {
        let (inventory, ledger, engine) = setup();
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#ff0000"), 2)
            .with(ProductId::new(1), key("#00ff00"), 1)
            .with(ProductId::new(99), key("#ff0000"), 1);

        let report = engine.ingest(&request).await.unwrap();
        assert_eq!(report.entry_count, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(
            report
                .skipped
                .iter()
                .any(|s| s.reason == SkipReason::UnknownProduct)
        );
        assert!(
            report
                .skipped
                .iter()
                .any(|s| s.reason == SkipReason::UnknownColor)
        );
        assert_eq!(ledger.rows().len(), 1);
        assert_eq!(inventory.stock(ProductId::new(1), "Rojo"), Some(3));
    }

    #[tokio::test]
    async fn test_ingest_all_skipped_writes_nothing() {
        let (inventory, ledger, engine) = setup();
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#00ff00"), 1)
            .with(ProductId::new(42), key("#ff0000"), 1);

        let err = engine.ingest(&request).await.unwrap_err();
        let issues = err.issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.product_id == Some(ProductId::new(42))));
        assert!(ledger.rows().is_empty());
        assert_eq!(inventory.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_ingest_ledger_failure_leaves_inventory_untouched() {
        let (inventory, ledger, engine) = setup();
        ledger.fail_inserts();
        let request = IngestRequest::new().with(ProductId::new(1), key("#ff0000"), 5);

        let err = engine.ingest(&request).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::LedgerInsert);
        assert!(!report.ledger_written);
        assert_eq!(report.inventory_not_applied.len(), 1);
        assert_eq!(inventory.stock(ProductId::new(1), "Rojo"), Some(1));
        assert!(!report.needs_reconciliation());
    }

    #[tokio::test]
    async fn test_ingest_partial_inventory_failure_is_not_rolled_back() {
        let (inventory, ledger, engine) = setup();
        inventory.fail_updates_for(ProductId::new(2));
        let request = IngestRequest::new()
            .with(ProductId::new(1), key("#ff0000"), 5)
            .with(ProductId::new(2), key("#0000ff"), 3);

        let err = engine.ingest(&request).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.stage, MutationStage::InventoryUpdate);
        assert!(report.ledger_written);
        assert!(report.rollback.is_none());
        assert_eq!(report.inventory_applied[0].product_id, ProductId::new(1));
        assert_eq!(report.inventory_not_applied[0].product_id, ProductId::new(2));
        assert!(report.needs_reconciliation());

        // Weaker guarantee than delete: product 1 stays incremented.
        assert_eq!(inventory.stock(ProductId::new(1), "Rojo"), Some(6));
        assert_eq!(inventory.stock(ProductId::new(2), "Azul"), Some(2));
        assert_eq!(ledger.rows().len(), 2);
    }

    #[test]
    fn test_request_wire_format() {
        let request: IngestRequest = serde_json::from_str(
            r##"[
                {"product_id": 1, "color_key": "FF0000", "quantity": 5},
                {"product_id": 1, "color_key": "#ff0000", "quantity": "7"},
                {"product_id": 2, "color_key": "#00f", "quantity": ""}
            ]"##,
        )
        .unwrap();
        assert_eq!(request.len(), 2);

        let lines: Vec<IngestLine> = request.into();
        assert_eq!(lines[0].quantity, QuantityInput::from("7"));
        assert_eq!(lines[1].color_key.as_str(), "#00f");
    }
}
