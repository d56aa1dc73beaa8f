//! Reconciliation cycle: fetch, merge, notify.
//!
//! # Invariants
//! - Phase moves `Idle -> Fetching -> Merging -> Idle`; a cycle that finds the
//!   phase not `Idle` returns `CycleOutcome::Skipped` without side effects.
//! - The outbound push is spawned per cycle and never awaited by it.
//! - Each completed cycle emits at most one `SyncNotification`.

use crate::model::quote::Quote;
use crate::repo::quote_repo::QuoteRepository;
use crate::service::quote_store::QuoteStore;
use crate::sync::reconcile::SyncNotification;
use crate::sync::remote::{RemoteError, RemoteQuoteSource};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

const NOTIFICATION_CAPACITY: usize = 16;

/// Reconciliation state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncPhase {
    Idle = 0,
    Fetching = 1,
    Merging = 2,
}

impl SyncPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Merging,
            _ => Self::Idle,
        }
    }
}

/// What a completed cycle changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub conflicts: usize,
    pub added: usize,
    pub notification: Option<SyncNotification>,
    /// `false` when the mirror does not hold the collection after this cycle.
    pub persisted: bool,
}

/// Result of one `run_cycle` call.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle was in flight.
    Skipped,
    /// Remote fetch failed; local state untouched.
    Failed(RemoteError),
    Completed(CycleReport),
}

/// Resets the phase to `Idle` when the cycle ends, including on cancellation.
struct CycleGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> CycleGuard<'a> {
    fn try_begin(phase: &'a AtomicU8) -> Option<Self> {
        phase
            .compare_exchange(
                SyncPhase::Idle as u8,
                SyncPhase::Fetching as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { phase })
    }

    fn enter_merging(&self) {
        self.phase.store(SyncPhase::Merging as u8, Ordering::Release);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(SyncPhase::Idle as u8, Ordering::Release);
    }
}

/// Reconciles a quote store against a remote source.
pub struct SyncEngine<R: QuoteRepository> {
    store: Arc<QuoteStore<R>>,
    remote: Arc<dyn RemoteQuoteSource>,
    phase: AtomicU8,
    notifications: broadcast::Sender<SyncNotification>,
}

impl<R: QuoteRepository> SyncEngine<R> {
    pub fn new(store: Arc<QuoteStore<R>>, remote: Arc<dyn RemoteQuoteSource>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            store,
            remote,
            phase: AtomicU8::new(SyncPhase::Idle as u8),
            notifications,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn store(&self) -> &Arc<QuoteStore<R>> {
        &self.store
    }

    /// Receives one notification per cycle that changed something.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    /// Runs one fetch-merge-notify cycle.
    ///
    /// Must be called inside a tokio runtime (the push is spawned).
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(guard) = CycleGuard::try_begin(&self.phase) else {
            debug!("event=sync_cycle module=sync status=skip reason=in_flight");
            return CycleOutcome::Skipped;
        };
        let started_at = Instant::now();

        self.push_in_background(self.store.snapshot());

        let remote = match self.remote.fetch_quotes().await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(
                    "event=sync_cycle module=sync status=error stage=fetch duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return CycleOutcome::Failed(err);
            }
        };

        guard.enter_merging();
        let commit = self.store.merge_remote(&remote);
        if let Some(err) = &commit.persist_error {
            warn!("event=sync_cycle module=sync status=error stage=persist error={err}");
        }

        let notification = SyncNotification::for_counts(commit.conflicts, commit.added);
        if let Some(notification) = notification {
            // No subscribers is fine; the report still carries the notification.
            let _ = self.notifications.send(notification);
        }

        info!(
            "event=sync_cycle module=sync status=ok duration_ms={} fetched={} conflicts={} added={}",
            started_at.elapsed().as_millis(),
            remote.len(),
            commit.conflicts,
            commit.added
        );
        CycleOutcome::Completed(CycleReport {
            conflicts: commit.conflicts,
            added: commit.added,
            notification,
            persisted: commit.persist_error.is_none(),
        })
    }

    fn push_in_background(&self, quotes: Vec<Quote>) {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            match remote.push_quotes(&quotes).await {
                Ok(()) => debug!(
                    "event=sync_push module=sync status=ok count={}",
                    quotes.len()
                ),
                Err(err) => warn!("event=sync_push module=sync status=error error={err}"),
            }
        });
    }
}
