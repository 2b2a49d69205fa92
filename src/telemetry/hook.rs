//! Span helpers for hook callbacks.

use tracing::Span;

/// Start a span for one lifecycle callback.
///
/// `job.rows_affected` is declared empty and filled in by
/// [`record_rows_affected`] once the write lands.
pub fn start_hook_span(event: &'static str, job_id: &str) -> Span {
    tracing::info_span!(
        "hook.event",
        "job.event" = event,
        "job.id" = job_id,
        "job.rows_affected" = tracing::field::Empty,
    )
}

/// Record how many completion rows a callback touched.
pub fn record_rows_affected(span: &Span, rows: u64) {
    span.record("job.rows_affected", rows);
}
