//! End-to-end lifecycle of one pedido: ingest, edit, delete.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use bodega_admin::services::inventory::{EditOutcome, IssueKind, OperationError};
use bodega_core::{DeletePhase, DeleteStrategy};
use bodega_integration_tests::{PRODUCT_A, PRODUCT_B, TestContext};

// =============================================================================
// Ingest
// =============================================================================

#[tokio::test]
async fn test_ingest_creates_pedido_and_adds_stock() {
    let ctx = TestContext::new();

    let pedido_id = ctx.ingest_standard().await;

    assert_eq!(ctx.red(), 15);
    assert_eq!(ctx.blue(), 7);

    let history = ctx.engine.view().history().await.unwrap();
    assert_eq!(history.len(), 1);
    let pedido = &history[0];
    assert_eq!(pedido.pedido_id, pedido_id);
    assert_eq!(pedido.entries.len(), 2);
    assert_eq!(pedido.totals.units, 8);
    assert_eq!(pedido.totals.cost, Decimal::from(110));
}

// =============================================================================
// Edit
// =============================================================================

#[tokio::test]
async fn test_edit_reduces_quantity() {
    let ctx = TestContext::new();
    let pedido_id = ctx.ingest_standard().await;

    let request = ctx.edit(pedido_id, "Red", 2, None);
    let outcome = ctx.engine.edit(&request).await.unwrap();

    assert!(matches!(outcome, EditOutcome::Applied(_)));
    assert_eq!(ctx.red(), 12);
    assert_eq!(ctx.blue(), 7);
    assert_eq!(ctx.entry(pedido_id, "Red").quantity_added, 2);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_reverses_current_quantities() {
    let ctx = TestContext::new();
    let pedido_id = ctx.ingest_standard().await;
    ctx.engine
        .edit(&ctx.edit(pedido_id, "Red", 2, None))
        .await
        .unwrap();

    let report = ctx.engine.delete(&ctx.delete(pedido_id)).await.unwrap();

    assert_eq!(report.units_reversed, 5);
    assert_eq!(report.strategy, DeleteStrategy::ById);
    assert_eq!(report.phases.last(), Some(&DeletePhase::Done));
    assert_eq!(ctx.red(), 10);
    assert_eq!(ctx.blue(), 4);
    assert!(ctx.ledger.entries_of(pedido_id).is_empty());
    assert!(ctx.engine.view().pedido(pedido_id).await.unwrap().is_none());
    assert!(ctx.engine.view().history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_prefers_privileged_endpoint() {
    let (ctx, privileged) = TestContext::new().with_privileged();
    let pedido_id = ctx.ingest_standard().await;

    let report = ctx.engine.delete(&ctx.delete(pedido_id)).await.unwrap();

    assert_eq!(report.strategy, DeleteStrategy::PrivilegedById);
    assert_eq!(privileged.calls(), 1);
    assert!(ctx.ledger.entries_of(pedido_id).is_empty());
}

#[tokio::test]
async fn test_delete_rejected_after_external_sale() {
    let ctx = TestContext::new();
    let pedido_id = ctx.ingest_standard().await;
    ctx.inventory.set_stock(PRODUCT_B, "Blue", 2);
    let updates_before = ctx.inventory.update_calls();

    let err = ctx.engine.delete(&ctx.delete(pedido_id)).await.unwrap_err();

    let OperationError::Validation(issues) = &err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].product_id, Some(PRODUCT_B));
    assert!(matches!(
        issues[0].kind,
        IssueKind::InsufficientStock {
            current: 2,
            required: 3,
            shortfall: 1
        }
    ));

    assert_eq!(ctx.inventory.update_calls(), updates_before);
    assert_eq!(ctx.red(), 15);
    assert_eq!(ctx.blue(), 2);
    assert_eq!(ctx.ledger.entries_of(pedido_id).len(), 2);
    assert!(ctx.inventory.product(PRODUCT_A).is_some());
}
