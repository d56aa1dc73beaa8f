//! Repository layer over key-value collaborators.
//!
//! # Responsibility
//! - Map typed quote-store state onto string key-value entries.
//! - Keep JSON encoding and key naming out of the service layer.
//!
//! # Invariants
//! - Malformed persisted quote data is reported as a load outcome, never as
//!   an error.
//! - Write failures are always returned to the caller.

pub mod quote_repo;
