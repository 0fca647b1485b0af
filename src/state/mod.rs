//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `BackoffController`: reacts to rate limiting with exponential waits
//! - `RunState`: cursor, backoff and counters for one stage run
//! - `RunSummary`: what a finished run reports back

mod backoff;
mod run_state;

// Re-export main types
pub use backoff::{BackoffAction, BackoffController, BackoffState};
pub use run_state::{RunCounters, RunState, RunSummary, StopReason};
