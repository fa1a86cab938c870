//! Bodega Admin library.
//!
//! Inventory ledger reconciliation: the engine that keeps per-color product
//! stock consistent with the stock ledger, its `PostgreSQL` repositories, the
//! client for the privileged ledger API, and the HTTP service exposing it.
//!
//! # Security
//!
//! The ledger endpoints can hard-delete rows. They are guarded by a bearer
//! key and disabled when none is configured.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
