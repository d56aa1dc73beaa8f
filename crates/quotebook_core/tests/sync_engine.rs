use async_trait::async_trait;
use quotebook_core::repo::quote_repo::QUOTES_KEY;
use quotebook_core::storage::KvResult;
use quotebook_core::sync::remote::RemoteResult;
use quotebook_core::{
    CycleOutcome, KeyValueStore, KvError, KvQuoteRepository, MemoryKeyValueStore, Quote, QuoteId,
    QuoteStore, RemoteError, RemoteQuoteSource, SyncEngine, SyncNotification, SyncPhase,
    SyncScheduler,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

type TestRepo = KvQuoteRepository<MemoryKeyValueStore, MemoryKeyValueStore>;

/// Remote double replaying queued fetch results; an empty queue fetches nothing.
#[derive(Default)]
struct ScriptedRemote {
    fetches: Mutex<VecDeque<RemoteResult<Vec<Quote>>>>,
    fetch_calls: AtomicUsize,
    fetch_started: Notify,
    fetch_gate: Option<Arc<Notify>>,
    fail_push: bool,
    pushed: Mutex<Vec<Vec<Quote>>>,
    push_done: Notify,
}

impl ScriptedRemote {
    fn queue(&self, result: RemoteResult<Vec<Quote>>) {
        self.fetches.lock().unwrap().push_back(result);
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteQuoteSource for ScriptedRemote {
    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.notify_one();
        if let Some(gate) = &self.fetch_gate {
            gate.notified().await;
        }
        let next = self.fetches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()> {
        self.pushed.lock().unwrap().push(quotes.to_vec());
        self.push_done.notify_one();
        if self.fail_push {
            return Err(RemoteError::Status {
                status: 500,
                body: "push rejected".to_string(),
            });
        }
        Ok(())
    }
}

/// Durable store double whose writes can be switched to fail.
#[derive(Default)]
struct SwitchableKv {
    inner: MemoryKeyValueStore,
    fail_writes: AtomicBool,
}

impl KeyValueStore for SwitchableKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KvError::LockPoisoned);
        }
        self.inner.set(key, value)
    }
}

fn quote(id: u64, text: &str, category: &str) -> Quote {
    Quote::with_id(QuoteId::from(id), text, category).unwrap()
}

fn store_with(quotes: &[Quote]) -> Arc<QuoteStore<TestRepo>> {
    let durable = MemoryKeyValueStore::new();
    durable
        .set(QUOTES_KEY, &serde_json::to_string(quotes).unwrap())
        .unwrap();
    Arc::new(QuoteStore::open(KvQuoteRepository::new(
        durable,
        MemoryKeyValueStore::new(),
    )))
}

fn completed(outcome: CycleOutcome) -> quotebook_core::CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected completed cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn conflict_is_resolved_remote_wins_and_persisted() {
    let store = store_with(&[quote(1, "A", "X")]);
    let remote = Arc::new(ScriptedRemote::default());
    remote.queue(Ok(vec![quote(1, "B", "X")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.added, 0);
    assert_eq!(report.notification, Some(SyncNotification::ConflictsResolved(1)));
    assert!(report.persisted);
    assert_eq!(store.get(&QuoteId::from(1)).unwrap().text, "B");
    assert_eq!(store.load(), store.snapshot());
    assert_eq!(engine.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn remote_only_quotes_are_added_with_one_notification() {
    let store = store_with(&[quote(1, "A", "X")]);
    let remote = Arc::new(ScriptedRemote::default());
    remote.queue(Ok(vec![quote(2, "B", "Y"), quote(3, "C", "Z")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());
    let mut notifications = engine.subscribe();

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.added, 2);
    assert_eq!(store.len(), 3);
    assert_eq!(
        notifications.try_recv().unwrap(),
        SyncNotification::QuotesFetched(2)
    );
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn noop_cycle_is_silent() {
    let store = store_with(&[quote(1, "A", "X")]);
    let remote = Arc::new(ScriptedRemote::default());
    remote.queue(Ok(vec![quote(1, "A", "X")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());
    let mut notifications = engine.subscribe();

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.notification, None);
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn fetch_failure_leaves_state_unchanged_and_next_cycle_proceeds() {
    let store = store_with(&[quote(1, "A", "X")]);
    let remote = Arc::new(ScriptedRemote::default());
    remote.queue(Err(RemoteError::Decode("truncated".to_string())));
    remote.queue(Ok(vec![quote(2, "B", "Y")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());
    let before = store.snapshot();

    let outcome = engine.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Failed(RemoteError::Decode(_))));
    assert_eq!(store.snapshot(), before);
    assert_eq!(engine.phase(), SyncPhase::Idle);

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.added, 1);
    assert_eq!(remote.fetch_calls(), 2);
}

#[tokio::test]
async fn push_failure_does_not_affect_merge() {
    let store = store_with(&[quote(1, "A", "X")]);
    let remote = Arc::new(ScriptedRemote {
        fail_push: true,
        ..ScriptedRemote::default()
    });
    remote.queue(Ok(vec![quote(2, "B", "Y")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.added, 1);

    tokio::time::timeout(Duration::from_secs(1), remote.push_done.notified())
        .await
        .expect("push should be attempted");
    let pushed = remote.pushed.lock().unwrap().clone();
    assert_eq!(pushed, vec![vec![quote(1, "A", "X")]]);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn overlapping_cycle_is_skipped_while_fetch_is_in_flight() {
    let store = store_with(&[quote(1, "A", "X")]);
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(ScriptedRemote {
        fetch_gate: Some(Arc::clone(&gate)),
        ..ScriptedRemote::default()
    });
    remote.queue(Ok(vec![quote(1, "B", "X")]));
    let engine = Arc::new(SyncEngine::new(Arc::clone(&store), remote.clone()));
    let mut notifications = engine.subscribe();

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run_cycle().await }
    });
    remote.fetch_started.notified().await;
    assert_eq!(engine.phase(), SyncPhase::Fetching);

    let second = engine.run_cycle().await;
    assert!(matches!(second, CycleOutcome::Skipped));
    assert_eq!(remote.fetch_calls(), 1);

    gate.notify_one();
    let report = completed(first.await.unwrap());
    assert_eq!(report.conflicts, 1);
    assert_eq!(
        notifications.try_recv().unwrap(),
        SyncNotification::ConflictsResolved(1)
    );
    assert!(notifications.try_recv().is_err());
    assert_eq!(engine.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn scheduler_runs_cycles_until_stopped() {
    let store = store_with(&[]);
    let remote = Arc::new(ScriptedRemote::default());
    let engine = Arc::new(SyncEngine::new(store, remote.clone()));
    let scheduler = SyncScheduler::new();

    scheduler
        .start(Arc::clone(&engine), Duration::from_millis(20))
        .await;
    scheduler
        .start(Arc::clone(&engine), Duration::from_millis(20))
        .await;
    assert!(scheduler.is_running().await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(remote.fetch_calls() >= 1);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls_after_stop = remote.fetch_calls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.fetch_calls(), calls_after_stop);
}

#[tokio::test]
async fn scheduler_waits_one_interval_before_first_cycle() {
    let store = store_with(&[]);
    let remote = Arc::new(ScriptedRemote::default());
    let engine = Arc::new(SyncEngine::new(store, remote.clone()));
    let scheduler = SyncScheduler::new();

    scheduler.start(engine, Duration::from_secs(10)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.fetch_calls(), 0);

    scheduler.stop().await;
}

#[tokio::test]
async fn failed_mirror_write_keeps_merge_and_later_cycle_repairs_it() {
    let durable = Arc::new(SwitchableKv::default());
    durable.inner.set(QUOTES_KEY, "[]").unwrap();
    let store = Arc::new(QuoteStore::open(KvQuoteRepository::new(
        Arc::clone(&durable),
        MemoryKeyValueStore::new(),
    )));
    let remote = Arc::new(ScriptedRemote::default());
    for _ in 0..3 {
        remote.queue(Ok(vec![quote(1, "r", "c")]));
    }
    let engine = SyncEngine::new(Arc::clone(&store), remote.clone());

    durable.fail_writes.store(true, Ordering::SeqCst);
    let report = completed(engine.run_cycle().await);
    assert!(!report.persisted);
    assert_eq!(report.added, 1);
    assert_eq!(store.len(), 1);
    assert!(store.load().is_empty());

    let report = completed(engine.run_cycle().await);
    assert_eq!(report.added, 0);
    assert!(!report.persisted);

    durable.fail_writes.store(false, Ordering::SeqCst);
    let report = completed(engine.run_cycle().await);
    assert_eq!(report.added, 0);
    assert_eq!(report.conflicts, 0);
    assert_eq!(report.notification, None);
    assert!(report.persisted);
    assert_eq!(store.load(), store.snapshot());
    assert!(!store.mirror_is_stale());
}
