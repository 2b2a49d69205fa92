//! Completion-log queries against `_queue_job_completions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use sqlx::{Postgres, QueryBuilder};
use std::time::Instant;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{JobCompletionRecord, JobState, NewCompletionRecord, RecordFilter, Transition};
use crate::storage::CompletionStore;
use crate::telemetry::metrics;

const COLUMNS: &str = "id, job_id, job_name, queue_name, payload, max_retry_count, delay_until, \
     queued_at, dequeued_at, completed_at, error_string, state::text AS state, created_at, updated_at";

fn record_duration(operation: &'static str, started: Instant) {
    metrics::storage_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}

#[async_trait]
impl CompletionStore for super::Db {
    async fn insert(&self, record: NewCompletionRecord) -> Result<JobCompletionRecord> {
        let started = Instant::now();
        let row: CompletionRow = sqlx::query_as(&format!(
            "INSERT INTO _queue_job_completions (id, job_id, job_name, queue_name, payload, max_retry_count, delay_until, queued_at, state)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::job_state)
             RETURNING {COLUMNS}"
        ))
        .bind(record.id)
        .bind(&record.job_id)
        .bind(&record.job_name)
        .bind(&record.queue_name)
        .bind(&record.payload)
        .bind(record.max_retry_count)
        .bind(record.delay_until)
        .bind(record.queued_at)
        .bind(record.state.as_str())
        .fetch_one(self.pool())
        .await?;
        record_duration("insert", started);
        Ok(row.into_record())
    }

    async fn apply_transition(&self, job_id: &str, transition: &Transition) -> Result<u64> {
        let started = Instant::now();
        let state = transition.state().as_str();
        let query = match transition {
            Transition::Running { .. } => sqlx::query(
                "UPDATE _queue_job_completions
                 SET state = $1::job_state, dequeued_at = $2, updated_at = now()
                 WHERE job_id = $3",
            ),
            Transition::Succeeded { .. } => sqlx::query(
                "UPDATE _queue_job_completions
                 SET state = $1::job_state, completed_at = $2, updated_at = now()
                 WHERE job_id = $3",
            ),
            Transition::Failed { .. } => sqlx::query(
                "UPDATE _queue_job_completions
                 SET state = $1::job_state, completed_at = $2, error_string = $4, updated_at = now()
                 WHERE job_id = $3",
            ),
        }
        .bind(state)
        .bind(transition.at())
        .bind(job_id);
        let query = match transition {
            Transition::Failed { error, .. } => query.bind(error.as_str()),
            _ => query,
        };
        let rows_affected = query.execute(self.pool()).await?.rows_affected();
        record_duration(transition.event_name(), started);
        Ok(rows_affected)
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Vec<JobCompletionRecord>> {
        let rows: Vec<CompletionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM _queue_job_completions
             WHERE job_id = $1
             ORDER BY queued_at DESC, created_at DESC"
        ))
        .bind(job_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(CompletionRow::into_record).collect())
    }

    async fn list(&self, filter: &RecordFilter, limit: i64) -> Result<Vec<JobCompletionRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM _queue_job_completions WHERE TRUE"
        ));
        if let Some(state) = filter.state {
            qb.push(" AND state::text = ").push_bind(state.as_str());
        }
        if let Some(ref queue) = filter.queue_name {
            qb.push(" AND queue_name = ").push_bind(queue.clone());
        }
        if let Some(ref name) = filter.job_name {
            qb.push(" AND job_name = ").push_bind(name.clone());
        }
        qb.push(" ORDER BY queued_at DESC, created_at DESC LIMIT ")
            .push_bind(limit.max(0));

        let rows: Vec<CompletionRow> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(CompletionRow::into_record).collect())
    }
}

/// Internal row type for sqlx::FromRow.
///
/// `state` is read as text so values this build doesn't know decode to
/// `JobState::Unknown` instead of failing the query.
#[derive(sqlx::FromRow)]
struct CompletionRow {
    id: Uuid,
    job_id: String,
    job_name: String,
    queue_name: String,
    payload: Vec<u8>,
    max_retry_count: i32,
    delay_until: Option<DateTime<Utc>>,
    queued_at: DateTime<Utc>,
    dequeued_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_string: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CompletionRow {
    fn into_record(self) -> JobCompletionRecord {
        JobCompletionRecord {
            id: self.id,
            job_id: self.job_id,
            job_name: self.job_name,
            queue_name: self.queue_name,
            payload: self.payload,
            max_retry_count: self.max_retry_count,
            delay_until: self.delay_until,
            queued_at: self.queued_at,
            dequeued_at: self.dequeued_at,
            completed_at: self.completed_at,
            error_string: self.error_string,
            state: JobState::from(self.state.as_str()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
