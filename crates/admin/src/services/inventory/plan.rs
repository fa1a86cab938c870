//! Per-product stock changes computed during preflight.
//!
//! Decrements are checked against the stock read at preflight minus every
//! decrement already planned for the same color; increments never offset a
//! decrement. The resulting stock is therefore non-negative whatever order
//! the individual changes would be applied in.

use std::collections::BTreeMap;

use bodega_core::ProductId;

use super::outcome::{ColorChange, IssueKind, ProductChange};
use crate::models::product::Product;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    added: i64,
    removed: i64,
}

#[derive(Debug)]
struct ProductTally {
    product: Product,
    colors: BTreeMap<usize, Tally>,
}

/// Accumulates stock deltas per product and color.
#[derive(Debug, Default)]
pub(crate) struct StockPlan {
    products: BTreeMap<ProductId, ProductTally>,
}

/// One product's inventory write: the snapshot read at preflight and the
/// color list to store.
#[derive(Debug, Clone)]
pub(crate) struct PlannedProduct {
    pub before: Product,
    pub after: Product,
    pub change: ProductChange,
}

impl StockPlan {
    /// Plan `delta` units on `product.colors[color]`.
    ///
    /// Nothing is recorded when the change is rejected.
    pub fn add(&mut self, product: &Product, color: usize, delta: i64) -> Result<(), IssueKind> {
        let current = product
            .colors
            .get(color)
            .map(|c| c.stock)
            .ok_or_else(|| IssueKind::UnknownColor(format!("#{color}")))?;

        let entry = self
            .products
            .entry(product.id)
            .or_insert_with(|| ProductTally {
                product: product.clone(),
                colors: BTreeMap::new(),
            });
        let tally = entry.colors.get(&color).copied().unwrap_or_default();

        let next = if delta < 0 {
            let removed = tally.removed + delta.abs();
            if removed > i64::from(current) {
                return Err(IssueKind::InsufficientStock {
                    current,
                    required: removed,
                    shortfall: removed - i64::from(current),
                });
            }
            Tally { removed, ..tally }
        } else {
            let added = tally.added + delta;
            if i64::from(current) + added > i64::from(i32::MAX) {
                return Err(IssueKind::StockOverflow { current, added });
            }
            Tally { added, ..tally }
        };

        entry.colors.insert(color, next);
        Ok(())
    }

    /// Build the inventory writes, one per product with a non-zero net change.
    pub fn build(self) -> Vec<PlannedProduct> {
        self.products
            .into_values()
            .filter_map(|tally| {
                let before = tally.product;
                let mut after = before.clone();
                let mut colors = Vec::new();

                for (index, Tally { added, removed }) in tally.colors {
                    let net = added - removed;
                    let Some(color) = after.colors.get_mut(index) else {
                        continue;
                    };
                    // Bounded by the checks in `add`.
                    let (Ok(delta), Ok(stock)) = (
                        i32::try_from(net),
                        i32::try_from(i64::from(color.stock) + net),
                    ) else {
                        continue;
                    };
                    if delta == 0 {
                        continue;
                    }
                    color.stock = stock;
                    colors.push(ColorChange {
                        color_name: color.name.clone(),
                        delta,
                    });
                }

                if colors.is_empty() {
                    return None;
                }
                let change = ProductChange {
                    product_id: before.id,
                    product_name: before.label(),
                    colors,
                };
                Some(PlannedProduct {
                    before,
                    after,
                    change,
                })
            })
            .collect()
    }
}

/// Sum of all positive deltas in a plan.
pub(crate) fn units_added(plan: &[PlannedProduct]) -> i64 {
    plan.iter()
        .flat_map(|p| &p.change.colors)
        .map(|c| i64::from(c.delta.max(0)))
        .sum()
}

/// Sum of all negative deltas in a plan, as a positive number.
pub(crate) fn units_removed(plan: &[PlannedProduct]) -> i64 {
    plan.iter()
        .flat_map(|p| &p.change.colors)
        .map(|c| i64::from((-c.delta).max(0)))
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::services::inventory::memory::sample_product;

    #[test]
    fn test_increments_grouped_per_product() {
        let product = sample_product(1, "Mochila", &[("Rojo", "#ff0000", 1), ("Azul", "#0000ff", 0)]);
        let mut plan = StockPlan::default();
        plan.add(&product, 0, 5).unwrap();
        plan.add(&product, 1, 2).unwrap();
        plan.add(&product, 0, 1).unwrap();

        let built = plan.build();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].after.colors[0].stock, 7);
        assert_eq!(built[0].after.colors[1].stock, 2);
        assert_eq!(built[0].before.colors[0].stock, 1);
        assert_eq!(units_added(&built), 8);
    }

    #[test]
    fn test_decrements_accumulate_against_preflight_stock() {
        let product = sample_product(1, "Mochila", &[("Rojo", "#ff0000", 4)]);
        let mut plan = StockPlan::default();
        plan.add(&product, 0, -3).unwrap();

        let err = plan.add(&product, 0, -2).unwrap_err();
        assert_eq!(
            err,
            IssueKind::InsufficientStock {
                current: 4,
                required: 5,
                shortfall: 1
            }
        );

        // The rejected change is not recorded.
        let built = plan.build();
        assert_eq!(built[0].after.colors[0].stock, 1);
        assert_eq!(units_removed(&built), 3);
    }

    #[test]
    fn test_increment_does_not_cover_decrement() {
        let product = sample_product(1, "Mochila", &[("Rojo", "#ff0000", 2)]);
        let mut plan = StockPlan::default();
        plan.add(&product, 0, 3).unwrap();
        assert!(matches!(
            plan.add(&product, 0, -4),
            Err(IssueKind::InsufficientStock { shortfall: 2, .. })
        ));
    }

    #[test]
    fn test_overflow_rejected() {
        let product = sample_product(1, "Mochila", &[("Rojo", "#ff0000", i32::MAX - 1)]);
        let mut plan = StockPlan::default();
        plan.add(&product, 0, 1).unwrap();
        assert!(matches!(
            plan.add(&product, 0, 1),
            Err(IssueKind::StockOverflow { .. })
        ));
    }

    #[test]
    fn test_net_zero_products_dropped() {
        let product = sample_product(1, "Mochila", &[("Rojo", "#ff0000", 5)]);
        let mut plan = StockPlan::default();
        plan.add(&product, 0, 2).unwrap();
        plan.add(&product, 0, -2).unwrap();
        assert!(plan.build().is_empty());
    }
}
