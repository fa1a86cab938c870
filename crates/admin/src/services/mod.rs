//! Business logic services for admin.
//!
//! # Services
//!
//! - `inventory` - Reconciliation engine (ingest, edit, delete) and ledger view
//! - `ledger_api` - Client and wire types for the privileged ledger API

pub mod inventory;
pub mod ledger_api;

pub use inventory::{InventoryEngine, OperationError};
pub use ledger_api::{LedgerApiClient, LedgerApiError};
