//! Per-session wiring of store, sync engine and scheduler.
//!
//! # Responsibility
//! - Build the single quote store for a session from configuration.
//! - Own the background sync scheduler and stop it on close.
//!
//! # Invariants
//! - The durable store and the remote are reachable only through the store
//!   and the engine this session hands out.

use crate::config::{ConfigError, QuotebookConfig};
use crate::repo::quote_repo::KvQuoteRepository;
use crate::service::quote_store::QuoteStore;
use crate::storage::{KeyValueStore, KvError, MemoryKeyValueStore, SqliteKeyValueStore};
use crate::sync::engine::{CycleOutcome, SyncEngine};
use crate::sync::remote::{HttpQuoteSource, RemoteError, RemoteQuoteSource};
use crate::sync::scheduler::SyncScheduler;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Repository type used by sessions.
pub type SessionRepository = KvQuoteRepository<Arc<dyn KeyValueStore>, Arc<MemoryKeyValueStore>>;

/// Session startup failure.
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Storage(KvError),
    Remote(RemoteError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "failed to open quote storage: {err}"),
            Self::Remote(err) => write!(f, "failed to set up remote sync: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Remote(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<KvError> for SessionError {
    fn from(value: KvError) -> Self {
        Self::Storage(value)
    }
}

impl From<RemoteError> for SessionError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

/// One quote store plus its sync machinery.
pub struct QuotebookSession {
    config: QuotebookConfig,
    store: Arc<QuoteStore<SessionRepository>>,
    engine: Arc<SyncEngine<SessionRepository>>,
    scheduler: SyncScheduler,
    session_kv: Arc<MemoryKeyValueStore>,
}

impl QuotebookSession {
    /// Opens SQLite storage and the HTTP remote described by `config`.
    ///
    /// Must be called inside a tokio runtime when `sync.enabled` is set.
    pub async fn open(config: QuotebookConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let durable = match &config.db_path {
            Some(path) => SqliteKeyValueStore::open(path)?,
            None => SqliteKeyValueStore::open_in_memory()?,
        };
        let remote = HttpQuoteSource::from_config(&config.sync)?;
        Self::with_parts(config, Arc::new(durable), Arc::new(remote)).await
    }

    /// Builds a session over caller-provided collaborators.
    pub async fn with_parts(
        config: QuotebookConfig,
        durable: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteQuoteSource>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let session_kv = Arc::new(MemoryKeyValueStore::new());
        let repo = KvQuoteRepository::new(durable, Arc::clone(&session_kv));
        let store = Arc::new(QuoteStore::open(repo));
        let engine = Arc::new(SyncEngine::new(Arc::clone(&store), remote));
        let scheduler = SyncScheduler::new();

        if config.sync.enabled {
            scheduler
                .start(
                    Arc::clone(&engine),
                    Duration::from_secs(config.sync.interval_secs),
                )
                .await;
        }

        Ok(Self {
            config,
            store,
            engine,
            scheduler,
            session_kv,
        })
    }

    pub fn config(&self) -> &QuotebookConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<QuoteStore<SessionRepository>> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<SyncEngine<SessionRepository>> {
        &self.engine
    }

    /// Runs one reconciliation cycle outside the timer.
    pub async fn sync_now(&self) -> CycleOutcome {
        self.engine.run_cycle().await
    }

    pub async fn is_syncing_in_background(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// Stops background sync and clears session-scoped state.
    pub async fn close(&self) {
        self.scheduler.stop().await;
        if let Err(err) = self.session_kv.clear() {
            warn!("event=session_close module=session status=error error={err}");
        }
    }
}
