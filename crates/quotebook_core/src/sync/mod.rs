//! Local/remote quote synchronization.
//!
//! # Responsibility
//! - Merge remote quotes into the store with a remote-wins policy.
//! - Run reconciliation cycles with a reentrancy guard.
//! - Repeat cycles on a fixed interval until stopped.
//!
//! # Invariants
//! - Sync never deletes a local quote.
//! - At most one cycle is fetching or merging at any time.
//! - A failed cycle leaves local state untouched and does not stop the timer.

pub mod engine;
pub mod reconcile;
pub mod remote;
pub mod scheduler;
