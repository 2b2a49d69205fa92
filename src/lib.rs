//! # queue-hooks
//!
//! Durable audit trail for background job queues.
//!
//! [`hook::QueuesDatabaseHook`] listens to job lifecycle events (dispatched,
//! dequeued, succeeded, failed) and records each one in the
//! `_queue_job_completions` table, one row per dispatched job.
//!
//! ```no_run
//! use queue_hooks::db::Db;
//! use queue_hooks::hook::{JobEventDelegate, QueuesDatabaseHook};
//! use queue_hooks::model::JobEventData;
//!
//! # async fn run() -> queue_hooks::error::Result<()> {
//! let db = Db::connect("postgres://localhost/app").await?;
//! db.migrate().await?;
//!
//! let hook = QueuesDatabaseHook::new(db);
//! hook.dispatched(JobEventData::new("job-1", "send-email", "default", chrono::Utc::now()))
//!     .await?;
//! hook.did_dequeue("job-1").await?;
//! hook.success("job-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod hook;
pub mod model;
pub mod storage;
pub mod telemetry;
