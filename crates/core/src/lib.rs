//! `orderflow-core`: order model and validation rules.
//!
//! This crate is **pure domain**: no IO, no async, no infrastructure concerns.

pub mod error;
pub mod order;
pub mod validation;

pub use error::ValidationError;
pub use order::{Delivery, Item, Order, Payment};
pub use validation::{Problem, ensure_valid, validate, validate_at};
