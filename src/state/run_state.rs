use crate::state::BackoffController;
use std::fmt;

/// Why a stage stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The store endpoint answered with neither success nor rate limiting.
    ///
    /// `None` means no status was received (transport or body failure).
    Terminal(Option<u16>),

    /// The configured upper identifier was reached
    Bound { last: i64 },

    /// Every input entry was processed
    InputExhausted,

    /// The configured rate-limit retry cap was hit on this unit
    RetriesExhausted { unit: i64 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(Some(status)) => write!(f, "terminal response (HTTP {})", status),
            Self::Terminal(None) => write!(f, "terminal response (no status)"),
            Self::Bound { last } => write!(f, "reached max-store-id {}", last),
            Self::InputExhausted => write!(f, "input exhausted"),
            Self::RetriesExhausted { unit } => {
                write!(f, "rate-limit retries exhausted at {}", unit)
            }
        }
    }
}

/// Counters accumulated over a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Fetch attempts issued, retries included
    pub attempts: u64,

    /// Units that produced a record
    pub succeeded: u64,

    /// Units permanently skipped (data errors and terminal responses in the join)
    pub skipped: u64,

    /// Rate-limit responses observed
    pub rate_limited: u64,

    /// Records that could not be written
    pub persist_failures: u64,
}

/// Mutable state of one stage run
///
/// Owned by the driver for the lifetime of the run and never shared.
#[derive(Debug)]
pub struct RunState {
    /// Next identifier (stores) or input index (purchases) to attempt
    pub cursor: i64,

    pub backoff: BackoffController,

    pub counters: RunCounters,
}

impl RunState {
    pub fn new(cursor: i64, backoff: BackoffController) -> Self {
        Self {
            cursor,
            backoff,
            counters: RunCounters::default(),
        }
    }

    /// Freezes the state into the summary returned to the caller
    pub fn finish(self, checkpoint: i64, stop: StopReason) -> RunSummary {
        RunSummary {
            counters: self.counters,
            checkpoint,
            stop,
        }
    }
}

/// Outcome of a completed stage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub counters: RunCounters,

    /// Checkpoint value persisted at shutdown
    pub checkpoint: i64,

    pub stop: StopReason,
}
