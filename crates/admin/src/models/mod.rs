//! Domain models for admin.

pub mod ledger;
pub mod product;

pub use ledger::{LedgerEntry, LedgerEntryUpdate};
pub use product::{ColorMatch, Product, ProductColor};
