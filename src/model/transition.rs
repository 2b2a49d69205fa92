//! Lifecycle events mapped onto completion-record updates.
//!
//! ```text
//! queued --(dequeue)--> running --(success)--> success
//!                               \-(error)----> error
//! ```
//!
//! Updates are applied unconditionally. A job whose dequeue notification
//! was lost or arrived late can go straight from `queued` to a terminal
//! state, and a stale notification simply wins if it lands last.

use chrono::{DateTime, Utc};

use super::state::JobState;

/// The write a post-dispatch lifecycle event performs on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A worker picked the job up. Sets `dequeued_at`.
    Running { at: DateTime<Utc> },
    /// The job finished. Sets `completed_at`.
    Succeeded { at: DateTime<Utc> },
    /// The job failed. Sets `completed_at` and the rendered error.
    Failed { at: DateTime<Utc>, error: String },
}

impl Transition {
    /// The state a record lands in after this transition.
    pub fn state(&self) -> JobState {
        match self {
            Transition::Running { .. } => JobState::Running,
            Transition::Succeeded { .. } => JobState::Success,
            Transition::Failed { .. } => JobState::Error,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Transition::Running { at }
            | Transition::Succeeded { at }
            | Transition::Failed { at, .. } => *at,
        }
    }

    /// Short event name used in spans, logs and metric labels.
    pub fn event_name(&self) -> &'static str {
        match self {
            Transition::Running { .. } => "dequeue",
            Transition::Succeeded { .. } => "success",
            Transition::Failed { .. } => "error",
        }
    }
}
