//! Storage port for the completion log.
//!
//! The hook only needs two writes: insert a fresh row on dispatch and
//! apply a transition to every row carrying a job id. Reads exist for
//! operators and tests. [`crate::db::Db`] is the Postgres implementation;
//! [`MemoryStore`] keeps rows in process.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::{JobCompletionRecord, NewCompletionRecord, RecordFilter, Transition};

/// A shared, concurrency-safe handle to wherever completion records live.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    /// Persist a dispatched job as a new row. Returns the row as stored,
    /// with its audit timestamps filled in.
    async fn insert(&self, record: NewCompletionRecord) -> Result<JobCompletionRecord>;

    /// Apply `transition` to all rows whose `job_id` matches.
    ///
    /// Returns the number of rows touched. Zero is not an error.
    async fn apply_transition(&self, job_id: &str, transition: &Transition) -> Result<u64>;

    /// All rows for a job id, newest first.
    async fn find_by_job_id(&self, job_id: &str) -> Result<Vec<JobCompletionRecord>>;

    /// Rows matching `filter`, newest first, at most `limit`.
    async fn list(&self, filter: &RecordFilter, limit: i64) -> Result<Vec<JobCompletionRecord>>;
}

/// All rows for a job id, newest first, or [`Error::NotFound`] if the job
/// was never recorded.
pub async fn require_job<S>(store: &S, job_id: &str) -> Result<Vec<JobCompletionRecord>>
where
    S: CompletionStore + ?Sized,
{
    let records = store.find_by_job_id(job_id).await?;
    if records.is_empty() {
        return Err(Error::NotFound(format!("job {job_id}")));
    }
    Ok(records)
}

#[async_trait]
impl<S: CompletionStore + ?Sized> CompletionStore for std::sync::Arc<S> {
    async fn insert(&self, record: NewCompletionRecord) -> Result<JobCompletionRecord> {
        (**self).insert(record).await
    }

    async fn apply_transition(&self, job_id: &str, transition: &Transition) -> Result<u64> {
        (**self).apply_transition(job_id, transition).await
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Vec<JobCompletionRecord>> {
        (**self).find_by_job_id(job_id).await
    }

    async fn list(&self, filter: &RecordFilter, limit: i64) -> Result<Vec<JobCompletionRecord>> {
        (**self).list(filter, limit).await
    }
}
