//! Data the queue engine hands over when a job is dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything known about a job at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEventData {
    /// The engine's identifier for the job. Used for every later lookup.
    pub job_id: String,
    pub job_name: String,
    pub queue_name: String,
    /// Serialized job arguments.
    pub payload: Vec<u8>,
    pub max_retry_count: i32,
    /// Earliest time the job may run, if it was delayed.
    pub delay_until: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
}

impl JobEventData {
    pub fn new(
        job_id: impl Into<String>,
        job_name: impl Into<String>,
        queue_name: impl Into<String>,
        queued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_name: job_name.into(),
            queue_name: queue_name.into(),
            payload: Vec::new(),
            max_retry_count: 0,
            delay_until: None,
            queued_at,
        }
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn max_retry_count(mut self, n: i32) -> Self {
        self.max_retry_count = n;
        self
    }

    pub fn delay_until(mut self, at: DateTime<Utc>) -> Self {
        self.delay_until = Some(at);
        self
    }
}
