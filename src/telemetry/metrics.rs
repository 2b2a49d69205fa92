//! Metric instrument factories for queue-hooks.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"queue-hooks"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for queue-hooks instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("queue-hooks")
}

/// Counter: lifecycle events handled by the hook.
/// Labels: `event` ("dispatch" | "dequeue" | "success" | "error"),
/// `result` ("ok" | "unmatched" | "error").
pub fn hook_events() -> Counter<u64> {
    meter()
        .u64_counter("queue_hooks.events")
        .with_description("Number of job lifecycle events recorded")
        .build()
}

/// Histogram: completion-log write latency in milliseconds.
/// Labels: `operation`.
pub fn storage_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("queue_hooks.storage.duration_ms")
        .with_description("Completion log write duration in milliseconds")
        .with_unit("ms")
        .build()
}
