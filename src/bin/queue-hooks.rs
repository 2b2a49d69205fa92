//! queue-hooks CLI: operator interface to the job completion log.

use clap::{Parser, Subcommand};
use queue_hooks::config::Config;
use queue_hooks::config::secrets::ExposeSecret;
use queue_hooks::db::Db;
use queue_hooks::hook::{JobEventDelegate, QueuesDatabaseHook};
use queue_hooks::model::{JobCompletionRecord, JobEventData, JobState, RecordFilter};
use queue_hooks::storage::{self, CompletionStore};
use queue_hooks::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "queue-hooks", about = "Audit trail for background job queues")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the completion log schema
    Migrate,
    /// Drop the completion log schema
    Revert,
    /// Inspect recorded jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Send a lifecycle event through the hook by hand
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// List completion records, newest first
    List {
        /// Filter by state
        #[arg(long, value_parser = parse_state)]
        state: Option<JobState>,
        /// Filter by queue name
        #[arg(long)]
        queue: Option<String>,
        /// Filter by job name
        #[arg(long)]
        name: Option<String>,
        /// Maximum records to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show every record for a job id
    Show {
        job_id: String,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Record a dispatched job
    Dispatch {
        job_id: String,
        job_name: String,
        #[arg(long, default_value = "default")]
        queue: String,
        /// Payload, stored as UTF-8 bytes
        #[arg(long, default_value = "")]
        payload: String,
        #[arg(long, default_value_t = 0)]
        max_retries: i32,
    },
    /// Mark a job as running
    Dequeue { job_id: String },
    /// Mark a job as succeeded
    Success { job_id: String },
    /// Mark a job as failed
    Error { job_id: String, message: String },
}

/// Failure reported on the command line.
#[derive(Debug)]
struct ReportedFailure(String);

impl std::fmt::Display for ReportedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ReportedFailure {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "queue-hooks".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect_with(config.database_url.expose_secret(), config.max_connections).await?;

    match cli.command {
        Command::Migrate => {
            db.migrate().await?;
            println!("Completion log schema is up to date.");
        }
        Command::Revert => {
            db.revert().await?;
            println!("Completion log schema dropped.");
        }
        Command::Jobs { action } => match action {
            JobsAction::List {
                state,
                queue,
                name,
                limit,
            } => cmd_jobs_list(&db, state, queue, name, limit).await?,
            JobsAction::Show { job_id, json } => cmd_jobs_show(&db, &job_id, json).await?,
        },
        Command::Event { action } => cmd_event(db, action).await?,
    }

    Ok(())
}

async fn cmd_jobs_list(
    db: &Db,
    state: Option<JobState>,
    queue: Option<String>,
    name: Option<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let filter = RecordFilter {
        state,
        queue_name: queue,
        job_name: name,
    };
    let records = db.list(&filter, limit).await?;

    if records.is_empty() {
        println!("No completion records found.");
        return Ok(());
    }

    println!(
        "{:<24}  {:<20}  {:<12}  {:<8}  {:<16}  COMPLETED",
        "JOB_ID", "NAME", "QUEUE", "STATE", "QUEUED"
    );
    println!("{}", "-".repeat(100));

    for record in &records {
        println!(
            "{:<24}  {:<20}  {:<12}  {:<8}  {:<16}  {}",
            truncate(&record.job_id, 24),
            truncate(&record.job_name, 20),
            truncate(&record.queue_name, 12),
            record.state,
            record.queued_at.format("%Y-%m-%d %H:%M"),
            record
                .completed_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    println!("\n{} record(s)", records.len());
    Ok(())
}

async fn cmd_jobs_show(db: &Db, job_id: &str, json: bool) -> anyhow::Result<()> {
    let records = storage::require_job(db, job_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &JobCompletionRecord) {
    let opt = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
    };

    println!("Record:      {}", record.id);
    println!("Job ID:      {}", record.job_id);
    println!("Name:        {}", record.job_name);
    println!("Queue:       {}", record.queue_name);
    println!("State:       {}", record.state);
    println!("Max Retries: {}", record.max_retry_count);
    println!("Payload:     {} byte(s)", record.payload.len());
    println!("Delay Until: {}", opt(record.delay_until));
    println!("Queued:      {}", record.queued_at);
    println!("Dequeued:    {}", opt(record.dequeued_at));
    println!("Completed:   {}", opt(record.completed_at));
    if let Some(ref err) = record.error_string {
        println!("Error:       {err}");
    }
    println!("Created:     {}", record.created_at);
    println!("Updated:     {}", record.updated_at);
}

async fn cmd_event(db: Db, action: EventAction) -> anyhow::Result<()> {
    let hook = QueuesDatabaseHook::new(db);

    match action {
        EventAction::Dispatch {
            job_id,
            job_name,
            queue,
            payload,
            max_retries,
        } => {
            let data = JobEventData::new(&job_id, job_name, queue, chrono::Utc::now())
                .payload(payload.into_bytes())
                .max_retry_count(max_retries);
            hook.dispatched(data).await?;
            println!("Dispatched: {job_id}");
        }
        EventAction::Dequeue { job_id } => {
            hook.did_dequeue(&job_id).await?;
            println!("Running: {job_id}");
        }
        EventAction::Success { job_id } => {
            hook.success(&job_id).await?;
            println!("Succeeded: {job_id}");
        }
        EventAction::Error { job_id, message } => {
            hook.error(&job_id, &ReportedFailure(message)).await?;
            println!("Failed: {job_id}");
        }
    }
    Ok(())
}

fn parse_state(raw: &str) -> Result<JobState, String> {
    JobState::from_name(raw).ok_or_else(|| {
        let names: Vec<_> = JobState::ALL.iter().map(|s| s.as_str()).collect();
        format!("invalid state '{raw}', expected one of: {}", names.join(", "))
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
