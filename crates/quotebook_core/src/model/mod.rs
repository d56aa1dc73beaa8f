//! Quote domain model.
//!
//! # Responsibility
//! - Define the canonical `Quote` record held by the store.
//! - Define the category filter used by read paths.
//!
//! # Invariants
//! - Every quote carries a stable `QuoteId`, including quotes created locally
//!   before any remote id exists.
//! - `text` and `category` are non-empty after trimming.

pub mod category;
pub mod quote;
