//! Lifecycle hook behavior against the in-memory completion store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use queue_hooks::clock::ManualClock;
use queue_hooks::error::{Error, Result};
use queue_hooks::hook::{JobError, JobEventDelegate, QueuesDatabaseHook};
use queue_hooks::model::{
    JobCompletionRecord, JobEventData, JobState, NewCompletionRecord, RecordFilter, Transition,
};
use queue_hooks::storage::{self, CompletionStore, MemoryStore};

#[derive(Debug)]
struct Timeout;

impl std::fmt::Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("timeout")
    }
}

impl std::error::Error for Timeout {}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn test_hook() -> (QueuesDatabaseHook<Arc<MemoryStore>>, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let hook = QueuesDatabaseHook::new(store.clone()).with_clock(clock.clone());
    (hook, store, clock)
}

fn send_email(job_id: &str) -> JobEventData {
    JobEventData::new(job_id, "send-email", "default", t0())
        .payload(br#"{"to":"ops@example.com"}"#.to_vec())
        .max_retry_count(3)
}

async fn only_record(store: &MemoryStore, job_id: &str) -> JobCompletionRecord {
    let mut records = store.find_by_job_id(job_id).await.unwrap();
    assert_eq!(records.len(), 1, "expected one record for {job_id}");
    records.remove(0)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_creates_queued_record_with_event_fields() {
    let (hook, store, _) = test_hook();
    let delay = t0() + Duration::minutes(10);
    let event = send_email("abc").delay_until(delay);

    hook.dispatched(event.clone()).await.unwrap();

    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Queued);
    assert_eq!(record.dequeued_at, None);
    assert_eq!(record.completed_at, None);
    assert_eq!(record.error_string, None);
    assert_eq!(record.job_id, event.job_id);
    assert_eq!(record.job_name, event.job_name);
    assert_eq!(record.queue_name, event.queue_name);
    assert_eq!(record.payload, event.payload);
    assert_eq!(record.max_retry_count, 3);
    assert_eq!(record.delay_until, Some(delay));
    assert_eq!(record.queued_at, t0());
}

#[tokio::test]
async fn dispatch_assigns_distinct_record_ids() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("a")).await.unwrap();
    hook.dispatched(send_email("b")).await.unwrap();

    let a = only_record(&store, "a").await;
    let b = only_record(&store, "b").await;
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn payload_transform_runs_before_insert() {
    let store = Arc::new(MemoryStore::new());
    let hook = QueuesDatabaseHook::new(store.clone()).with_payload_transform(|mut data| {
        data.payload = b"[redacted]".to_vec();
        data
    });

    hook.dispatched(send_email("secret")).await.unwrap();

    let record = only_record(&store, "secret").await;
    assert_eq!(record.payload, b"[redacted]".to_vec());
    assert_eq!(record.job_name, "send-email");
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dequeue_marks_running_without_touching_dispatch_fields() {
    let (hook, store, clock) = test_hook();
    hook.dispatched(send_email("abc")).await.unwrap();
    let queued = only_record(&store, "abc").await;

    clock.advance(Duration::seconds(2));
    hook.did_dequeue("abc").await.unwrap();

    let running = only_record(&store, "abc").await;
    assert_eq!(running.state, JobState::Running);
    let dequeued_at = running.dequeued_at.expect("dequeued_at set");
    assert!(dequeued_at >= running.queued_at);
    assert_eq!(running.job_name, queued.job_name);
    assert_eq!(running.queue_name, queued.queue_name);
    assert_eq!(running.payload, queued.payload);
    assert_eq!(running.max_retry_count, queued.max_retry_count);
    assert_eq!(running.completed_at, None);
}

#[tokio::test]
async fn success_marks_completed() {
    let (hook, store, clock) = test_hook();
    hook.dispatched(send_email("abc")).await.unwrap();
    hook.did_dequeue("abc").await.unwrap();

    clock.advance(Duration::seconds(30));
    hook.success("abc").await.unwrap();

    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Success);
    assert_eq!(record.completed_at, Some(t0() + Duration::seconds(30)));
    assert_eq!(record.error_string, None);
}

#[tokio::test]
async fn error_records_rendered_failure() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("abc")).await.unwrap();

    hook.error("abc", &Timeout).await.unwrap();

    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Error);
    assert!(record.completed_at.is_some());
    assert_eq!(record.error_string.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn success_is_accepted_straight_from_queued() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("fast")).await.unwrap();

    hook.success("fast").await.unwrap();

    let record = only_record(&store, "fast").await;
    assert_eq!(record.state, JobState::Success);
    assert_eq!(record.dequeued_at, None);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn late_dequeue_wins_when_it_lands_last() {
    let (hook, store, clock) = test_hook();
    hook.dispatched(send_email("racy")).await.unwrap();

    hook.success("racy").await.unwrap();
    clock.advance(Duration::seconds(1));
    hook.did_dequeue("racy").await.unwrap();

    let record = only_record(&store, "racy").await;
    assert_eq!(record.state, JobState::Running);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn concrete_scenario_dispatch_dequeue_error() {
    let (hook, store, clock) = test_hook();
    let t1 = t0() + Duration::seconds(5);
    let t2 = t0() + Duration::seconds(65);

    hook.dispatched(send_email("abc")).await.unwrap();
    assert_eq!(only_record(&store, "abc").await.state, JobState::Queued);

    clock.set(t1);
    hook.did_dequeue("abc").await.unwrap();
    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Running);
    assert_eq!(record.dequeued_at, Some(t1));

    clock.set(t2);
    hook.error("abc", &Timeout).await.unwrap();
    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Error);
    assert_eq!(record.queued_at, t0());
    assert_eq!(record.dequeued_at, Some(t1));
    assert_eq!(record.completed_at, Some(t2));
    assert_eq!(record.error_string.as_deref(), Some("timeout"));
}

// ---------------------------------------------------------------------------
// Unmatched job ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_for_unknown_job_are_silent_no_ops() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("known")).await.unwrap();
    let before = only_record(&store, "known").await;

    hook.did_dequeue("missing").await.unwrap();
    hook.success("missing").await.unwrap();
    hook.error("missing", &Timeout).await.unwrap();

    assert_eq!(store.len().await, 1);
    assert!(store.find_by_job_id("missing").await.unwrap().is_empty());
    assert_eq!(only_record(&store, "known").await, before);
}

#[tokio::test]
async fn require_job_reports_never_dispatched_jobs_as_not_found() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("known")).await.unwrap();

    let found = storage::require_job(store.as_ref(), "known").await.unwrap();
    assert_eq!(found.len(), 1);

    let err = storage::require_job(store.as_ref(), "missing")
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::NotFound(ref what) if what.contains("missing")),
        "expected NotFound, got {err:?}"
    );
}

#[tokio::test]
async fn reused_job_id_updates_every_matching_row() {
    let (hook, store, _) = test_hook();
    hook.dispatched(send_email("dup")).await.unwrap();
    hook.dispatched(send_email("dup")).await.unwrap();

    hook.success("dup").await.unwrap();

    let records = store.find_by_job_id("dup").await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.state == JobState::Success));
}

// ---------------------------------------------------------------------------
// Error rendering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn custom_error_renderer_is_used() {
    let store = Arc::new(MemoryStore::new());
    let hook = QueuesDatabaseHook::new(store.clone())
        .with_error_renderer(|e: &JobError| format!("job failed: {e}"));

    hook.dispatched(send_email("abc")).await.unwrap();
    hook.error("abc", &Timeout).await.unwrap();

    let record = only_record(&store, "abc").await;
    assert_eq!(record.error_string.as_deref(), Some("job failed: timeout"));
}

#[tokio::test]
async fn panicking_renderer_falls_back_to_description() {
    let store = Arc::new(MemoryStore::new());
    let hook = QueuesDatabaseHook::new(store.clone())
        .with_error_renderer(|_: &JobError| -> String { panic!("renderer bug") });

    hook.dispatched(send_email("abc")).await.unwrap();
    hook.error("abc", &Timeout).await.unwrap();

    let record = only_record(&store, "abc").await;
    assert_eq!(record.state, JobState::Error);
    assert_eq!(record.error_string.as_deref(), Some("timeout"));
}

// ---------------------------------------------------------------------------
// Storage failures and concurrency
// ---------------------------------------------------------------------------

/// A store whose every write fails.
struct BrokenStore;

#[async_trait::async_trait]
impl CompletionStore for BrokenStore {
    async fn insert(&self, _record: NewCompletionRecord) -> Result<JobCompletionRecord> {
        Err(Error::Other("connection refused".into()))
    }

    async fn apply_transition(&self, _job_id: &str, _transition: &Transition) -> Result<u64> {
        Err(Error::Other("connection refused".into()))
    }

    async fn find_by_job_id(&self, _job_id: &str) -> Result<Vec<JobCompletionRecord>> {
        Ok(Vec::new())
    }

    async fn list(&self, _filter: &RecordFilter, _limit: i64) -> Result<Vec<JobCompletionRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn storage_errors_propagate_to_the_engine() {
    let hook = QueuesDatabaseHook::new(BrokenStore);

    let err = hook.dispatched(send_email("abc")).await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
    assert!(hook.did_dequeue("abc").await.is_err());
    assert!(hook.success("abc").await.is_err());
    assert!(hook.error("abc", &Timeout).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_jobs_are_recorded_independently() {
    let store = Arc::new(MemoryStore::new());
    let hook: Arc<dyn JobEventDelegate> = Arc::new(QueuesDatabaseHook::new(store.clone()));

    let mut handles = Vec::new();
    for i in 0..32 {
        let hook = hook.clone();
        handles.push(tokio::spawn(async move {
            let job_id = format!("job-{i}");
            hook.dispatched(send_email(&job_id)).await?;
            hook.did_dequeue(&job_id).await?;
            if i % 2 == 0 {
                hook.success(&job_id).await
            } else {
                hook.error(&job_id, &Timeout).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let succeeded = store
        .list(
            &RecordFilter {
                state: Some(JobState::Success),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    let failed = store
        .list(
            &RecordFilter {
                state: Some(JobState::Error),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(succeeded.len(), 16);
    assert_eq!(failed.len(), 16);
    assert!(failed.iter().all(|r| r.dequeued_at.is_some()));
}
