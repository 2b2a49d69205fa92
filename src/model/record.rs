//! The completion-log row and its dispatch-time builder.
//!
//! A record is created once when a job is dispatched and then updated in
//! place as the job moves through the queue. It is not event-sourced: each
//! lifecycle event overwrites the fields it owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::JobEventData;
use super::state::JobState;
use super::transition::Transition;

/// One job's lifecycle history as a single mutable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompletionRecord {
    /// Primary key, generated client-side at dispatch.
    pub id: Uuid,
    pub job_id: String,
    pub job_name: String,
    pub queue_name: String,
    pub payload: Vec<u8>,
    pub max_retry_count: i32,
    pub delay_until: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
    pub dequeued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Rendered failure. Only set on error.
    pub error_string: Option<String>,
    pub state: JobState,
    /// Managed by storage.
    pub created_at: DateTime<Utc>,
    /// Managed by storage.
    pub updated_at: DateTime<Utc>,
}

impl JobCompletionRecord {
    /// Build the stored row from a new record once storage has stamped it.
    pub fn from_new(new: NewCompletionRecord, stamped_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            job_id: new.job_id,
            job_name: new.job_name,
            queue_name: new.queue_name,
            payload: new.payload,
            max_retry_count: new.max_retry_count,
            delay_until: new.delay_until,
            queued_at: new.queued_at,
            dequeued_at: None,
            completed_at: None,
            error_string: None,
            state: new.state,
            created_at: stamped_at,
            updated_at: stamped_at,
        }
    }

    /// Apply a lifecycle transition in place. Storage-managed fields are
    /// left to the caller.
    pub fn apply(&mut self, transition: &Transition) {
        self.state = transition.state();
        match transition {
            Transition::Running { at } => self.dequeued_at = Some(*at),
            Transition::Succeeded { at } => self.completed_at = Some(*at),
            Transition::Failed { at, error } => {
                self.completed_at = Some(*at);
                self.error_string = Some(error.clone());
            }
        }
    }
}

/// A completion record as written on dispatch: always `queued`, with no
/// dequeue, completion or error data yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompletionRecord {
    pub(crate) id: Uuid,
    pub(crate) job_id: String,
    pub(crate) job_name: String,
    pub(crate) queue_name: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) max_retry_count: i32,
    pub(crate) delay_until: Option<DateTime<Utc>>,
    pub(crate) queued_at: DateTime<Utc>,
    pub(crate) state: JobState,
}

impl NewCompletionRecord {
    /// Capture a dispatched job, assigning a fresh record id.
    pub fn dispatched(data: JobEventData) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: data.job_id,
            job_name: data.job_name,
            queue_name: data.queue_name,
            payload: data.payload,
            max_retry_count: data.max_retry_count,
            delay_until: data.delay_until,
            queued_at: data.queued_at,
            state: JobState::Queued,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// Filters for operator reads over the completion log.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub state: Option<JobState>,
    pub queue_name: Option<String>,
    pub job_name: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &JobCompletionRecord) -> bool {
        self.state.is_none_or(|s| record.state == s)
            && self
                .queue_name
                .as_deref()
                .is_none_or(|q| record.queue_name == q)
            && self
                .job_name
                .as_deref()
                .is_none_or(|n| record.job_name == n)
    }
}
