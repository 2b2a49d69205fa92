//! Core data model.
//!
//! A completion record tracks one dispatched job: what it was, which queue
//! it ran on, and where it is in its lifecycle.

pub mod event;
pub mod record;
pub mod state;
pub mod transition;

pub use event::JobEventData;
pub use record::{JobCompletionRecord, NewCompletionRecord, RecordFilter};
pub use state::JobState;
pub use transition::Transition;
