//! In-process completion store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::CompletionStore;
use crate::error::{Error, Result};
use crate::model::{JobCompletionRecord, NewCompletionRecord, RecordFilter, Transition};

/// Completion records held in memory, in insertion order.
///
/// Behaves like the Postgres table: ids are unique, transitions hit every
/// row with the job id, and audit timestamps are stamped on write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<JobCompletionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl CompletionStore for MemoryStore {
    async fn insert(&self, record: NewCompletionRecord) -> Result<JobCompletionRecord> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|r| r.id == record.id()) {
            return Err(Error::Other(format!(
                "duplicate completion record id {}",
                record.id()
            )));
        }
        let stored = JobCompletionRecord::from_new(record, Utc::now());
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn apply_transition(&self, job_id: &str, transition: &Transition) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| r.job_id == job_id) {
            row.apply(transition);
            row.updated_at = now;
            affected += 1;
        }
        Ok(affected)
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Vec<JobCompletionRecord>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &RecordFilter, limit: i64) -> Result<Vec<JobCompletionRecord>> {
        let rows = self.rows.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(rows
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }
}
