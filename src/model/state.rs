//! Job lifecycle state as stored in the completion log.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// The status of a queue job.
///
/// Decoding is total: any text that isn't one of the four known names
/// becomes [`JobState::Unknown`]. Rows written by a newer version with
/// extra states therefore still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Dispatched but not yet picked up by a worker.
    Queued,
    /// Dequeued by a worker and currently running.
    Running,
    /// Finished successfully. Terminal.
    Success,
    /// Finished with an error. Terminal.
    Error,
    /// Anything this build doesn't recognize.
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Running,
        JobState::Success,
        JobState::Error,
        JobState::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Error => "error",
            JobState::Unknown => "unknown",
        }
    }

    /// Strict lookup by canonical name, for operator input where a typo
    /// should be rejected rather than read as `Unknown`.
    pub fn from_name(name: &str) -> Option<JobState> {
        JobState::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Error)
    }
}

impl From<&str> for JobState {
    fn from(raw: &str) -> Self {
        match raw {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "success" => JobState::Success,
            "error" => JobState::Error,
            _ => JobState::Unknown,
        }
    }
}

impl FromStr for JobState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobState::from(s))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
