//! Core types for Bodega.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod color;
pub mod id;
pub mod price;
pub mod quantity;
pub mod status;

pub use color::{ColorKey, ColorKeyError};
pub use id::*;
pub use price::{CostError, line_total, parse_cost, round_money};
pub use quantity::{QuantityError, QuantityInput};
pub use status::*;
