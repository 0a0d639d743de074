//! Activity logging
//!
//! Append-only JSONL trail of exchange workflows, separate from `tracing` output.

pub mod activity;

pub use activity::{ActivityEvent, ActivityEventType, ActivityLogger};
