//! Repeating reconciliation task.

use crate::repo::quote_repo::QuoteRepository;
use crate::sync::engine::SyncEngine;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default time between reconciliation cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(10);

/// Cancellable fixed-interval driver for `SyncEngine::run_cycle`.
///
/// Each tick spawns its own cycle, so a cycle outliving the interval overlaps
/// the next tick and that tick is coalesced by the engine's reentrancy guard.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the timer loop; no-op while a loop is already running.
    ///
    /// The first cycle runs one `interval` after start.
    pub async fn start<R>(&self, engine: Arc<SyncEngine<R>>, interval: Duration)
    where
        R: QuoteRepository + 'static,
    {
        let mut guard = self.task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let interval = interval.max(MIN_SYNC_INTERVAL);
        info!(
            "event=sync_scheduler module=sync status=start interval_ms={}",
            interval.as_millis()
        );
        *guard = Some(tokio::spawn(run_timer_loop(engine, interval)));
    }

    /// Stops the timer loop. A cycle already in flight runs to completion.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!("event=sync_scheduler module=sync status=stop");
        }
    }

    pub async fn is_running(&self) -> bool {
        let guard = self.task.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

async fn run_timer_loop<R>(engine: Arc<SyncEngine<R>>, interval: Duration)
where
    R: QuoteRepository + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.run_cycle().await;
        });
    }
}
