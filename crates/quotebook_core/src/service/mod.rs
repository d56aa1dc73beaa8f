//! Quote store use-case services.
//!
//! # Responsibility
//! - Own the in-memory quote collection and keep its persisted mirror current.
//! - Classify import candidates before anything is constructed.
//!
//! # Invariants
//! - Every mutation goes through repository persistence before returning.
//! - Service layer stays storage-agnostic (`QuoteRepository` only).

pub mod import;
pub mod quote_store;
