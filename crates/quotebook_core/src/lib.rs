//! Quote store and sync engine.
//! This crate owns quote invariants, persistence mapping and reconciliation.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::{ConfigError, QuotebookConfig, SyncConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::category::{CategoryFilter, ALL_CATEGORIES};
pub use model::quote::{Quote, QuoteId, QuoteValidationError};
pub use repo::quote_repo::{KvQuoteRepository, LoadedQuotes, QuoteRepository, RepoError, RepoResult};
pub use service::import::{Candidate, ImportRejection, ImportReport, RejectReason};
pub use service::quote_store::{pick_random, seed_quotes, EmptyPoolError, QuoteStore, StoreError};
pub use session::{QuotebookSession, SessionError};
pub use storage::{KeyValueStore, KvError, MemoryKeyValueStore, SqliteKeyValueStore};
pub use sync::engine::{CycleOutcome, CycleReport, SyncEngine, SyncPhase};
pub use sync::reconcile::{reconcile, ReconcileOutcome, SyncNotification};
pub use sync::remote::{HttpQuoteSource, RemoteError, RemoteQuoteSource};
pub use sync::scheduler::SyncScheduler;
