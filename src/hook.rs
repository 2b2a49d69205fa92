//! Job lifecycle hook that records every event in the completion log.
//!
//! The queue engine calls a [`JobEventDelegate`] as jobs move through it.
//! [`QueuesDatabaseHook`] is the delegate that turns those calls into
//! writes: an insert on dispatch and a job-id-filtered update for every
//! later event. It holds no mutable state, so one instance can be shared
//! across all of the engine's workers.

use async_trait::async_trait;
use opentelemetry::KeyValue;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::model::{JobEventData, NewCompletionRecord, Transition};
use crate::storage::CompletionStore;
use crate::telemetry::{hook as spans, metrics};

/// The opaque failure a job reports.
pub type JobError = dyn std::error::Error + Send + Sync + 'static;

/// Renders a job failure into the `error_string` column.
pub type ErrorRenderer = Arc<dyn Fn(&JobError) -> String + Send + Sync>;

/// Rewrites dispatch data before it is stored, e.g. to redact payloads.
pub type PayloadTransform = Arc<dyn Fn(JobEventData) -> JobEventData + Send + Sync>;

/// Callbacks a queue engine invokes as a job moves through its lifecycle.
///
/// Errors returned here are the engine's to handle; a failure in
/// `dispatched` normally aborts the dispatch.
#[async_trait]
pub trait JobEventDelegate: Send + Sync {
    /// The job was handed to the queue.
    async fn dispatched(&self, job: JobEventData) -> Result<()>;

    /// A worker picked the job up.
    async fn did_dequeue(&self, job_id: &str) -> Result<()>;

    /// The job finished successfully.
    async fn success(&self, job_id: &str) -> Result<()>;

    /// The job failed with `error`.
    async fn error(&self, job_id: &str, error: &JobError) -> Result<()>;
}

/// Default rendering: the error's `Display` output.
pub fn describe_error(error: &JobError) -> String {
    error.to_string()
}

/// Records job lifecycle events in a [`CompletionStore`].
pub struct QueuesDatabaseHook<S> {
    store: S,
    clock: Arc<dyn Clock>,
    error_renderer: ErrorRenderer,
    payload_transform: PayloadTransform,
}

impl<S: CompletionStore> QueuesDatabaseHook<S> {
    /// A hook with `Display` error rendering, untouched payloads and the
    /// system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            error_renderer: Arc::new(describe_error),
            payload_transform: Arc::new(|data: JobEventData| data),
        }
    }

    /// Replace how failures are rendered into `error_string`.
    ///
    /// A renderer that panics falls back to [`describe_error`].
    pub fn with_error_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&JobError) -> String + Send + Sync + 'static,
    {
        self.error_renderer = Arc::new(renderer);
        self
    }

    /// Rewrite dispatch data before the row is built.
    pub fn with_payload_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(JobEventData) -> JobEventData + Send + Sync + 'static,
    {
        self.payload_transform = Arc::new(transform);
        self
    }

    /// Take lifecycle timestamps from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Render a failure, never panicking.
    pub fn render_error(&self, error: &JobError) -> String {
        let renderer = &self.error_renderer;
        catch_unwind(AssertUnwindSafe(|| renderer(error))).unwrap_or_else(|_| {
            tracing::warn!("error renderer panicked, using default rendering");
            describe_error(error)
        })
    }

    async fn transition(&self, job_id: &str, transition: Transition) -> Result<()> {
        let event = transition.event_name();
        let state = transition.state();
        let span = spans::start_hook_span(event, job_id);

        async {
            tracing::info!(job_id, %state, "recording job state");
            let rows_affected = match self.store.apply_transition(job_id, &transition).await {
                Ok(rows) => rows,
                Err(e) => {
                    count_event(event, "error");
                    tracing::error!(job_id, %state, error = %e, "failed to record job state");
                    return Err(e);
                }
            };
            spans::record_rows_affected(&tracing::Span::current(), rows_affected);

            if rows_affected == 0 {
                count_event(event, "unmatched");
                tracing::warn!(job_id, %state, "no completion record matched job id");
            } else {
                count_event(event, "ok");
                tracing::info!(job_id, %state, rows_affected, "recorded job state");
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}

fn count_event(event: &'static str, result: &'static str) {
    metrics::hook_events().add(
        1,
        &[
            KeyValue::new("event", event),
            KeyValue::new("result", result),
        ],
    );
}

#[async_trait]
impl<S: CompletionStore> JobEventDelegate for QueuesDatabaseHook<S> {
    async fn dispatched(&self, job: JobEventData) -> Result<()> {
        let span = spans::start_hook_span("dispatch", &job.job_id);

        async {
            let record = NewCompletionRecord::dispatched((self.payload_transform)(job));
            let job_id = record.job_id().to_string();

            match self.store.insert(record).await {
                Ok(stored) => {
                    spans::record_rows_affected(&tracing::Span::current(), 1);
                    count_event("dispatch", "ok");
                    tracing::info!(
                        job_id = %job_id,
                        record_id = %stored.id,
                        queue = %stored.queue_name,
                        "added job to completion log"
                    );
                    Ok(())
                }
                Err(e) => {
                    count_event("dispatch", "error");
                    tracing::error!(job_id = %job_id, error = %e, "failed to add job to completion log");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn did_dequeue(&self, job_id: &str) -> Result<()> {
        let at = self.clock.now();
        self.transition(job_id, Transition::Running { at }).await
    }

    async fn success(&self, job_id: &str) -> Result<()> {
        let at = self.clock.now();
        self.transition(job_id, Transition::Succeeded { at }).await
    }

    async fn error(&self, job_id: &str, error: &JobError) -> Result<()> {
        let at = self.clock.now();
        let rendered = self.render_error(error);
        self.transition(job_id, Transition::Failed { at, error: rendered })
            .await
    }
}
