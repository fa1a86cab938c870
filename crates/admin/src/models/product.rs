//! Product catalog models as seen by the ledger engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_core::{ColorKey, ProductId};

/// One color variant of a product, carrying its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductColor {
    /// Display name (e.g. "Rojo"). Edit and delete match on this.
    pub name: String,
    /// Hex color key. Ingest matches on this.
    pub hex: ColorKey,
    /// Units currently in stock.
    pub stock: i32,
}

/// A catalog product.
///
/// The engine only ever rewrites `colors`; the remaining fields are read for
/// ledger snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub model: String,
    pub category: String,
    /// Current list price (snapshotted into ledger entries).
    pub price: Decimal,
    /// Current unit cost (snapshotted into ledger entries).
    pub cost: Decimal,
    pub colors: Vec<ProductColor>,
}

/// Result of looking up a color within a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMatch {
    /// Exactly one color matched, at this index.
    Found(usize),
    /// No color matched.
    Missing,
    /// More than one color matched (count).
    Ambiguous(usize),
}

impl Product {
    /// Find a color by its hex key.
    #[must_use]
    pub fn match_color_by_key(&self, key: &ColorKey) -> ColorMatch {
        Self::single(self.colors.iter().enumerate().filter(|(_, c)| &c.hex == key))
    }

    /// Find a color by its exact display name.
    #[must_use]
    pub fn match_color_by_name(&self, name: &str) -> ColorMatch {
        Self::single(self.colors.iter().enumerate().filter(|(_, c)| c.name == name))
    }

    /// Human-readable label for reports (`name model`).
    #[must_use]
    pub fn label(&self) -> String {
        if self.model.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.model)
        }
    }

    fn single<'a>(mut matches: impl Iterator<Item = (usize, &'a ProductColor)>) -> ColorMatch {
        let Some((index, _)) = matches.next() else {
            return ColorMatch::Missing;
        };
        let extra = matches.count();
        if extra == 0 {
            ColorMatch::Found(index)
        } else {
            ColorMatch::Ambiguous(extra + 1)
        }
    }
}
