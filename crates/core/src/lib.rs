//! Bodega Core - Shared types library.
//!
//! This crate provides common types used across all Bodega components:
//! - `admin` - Inventory ledger service (engine, repositories, HTTP endpoints)
//! - `cli` - Command-line tools for migrations and ledger operations
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, color keys, quantity and cost parsing, saga statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
