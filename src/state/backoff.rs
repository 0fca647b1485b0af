//! Rate-limit backoff controller
//!
//! A pure state machine: it is told the outcome of every fetch attempt and
//! answers whether the caller should move on, wait and retry the same unit,
//! or give up. It never sleeps or performs I/O itself.

use crate::crawler::FetchOutcome;
use std::time::Duration;

/// What the caller should do after a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// The outcome was final for this unit; carry on
    Proceed,

    /// Wait for `wait`, then retry the same unit
    Retry { wait: Duration },

    /// The configured retry cap was reached
    GiveUp { attempts: u32 },
}

/// In-memory backoff bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    /// Wait to apply on the next rate-limit response
    pub wait: Duration,

    /// Rate-limit responses seen since the last non-rate-limit outcome
    pub consecutive_rate_limits: u32,
}

/// Exponential backoff with a fixed multiplier of two
///
/// Waits are never capped. Retries are unbounded unless `with_max_retries`
/// is used.
#[derive(Debug, Clone)]
pub struct BackoffController {
    initial: Duration,
    max_retries: Option<u32>,
    state: BackoffState,
}

impl BackoffController {
    /// Creates a controller in the `Normal` state with wait `initial`
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            max_retries: None,
            state: BackoffState {
                wait: initial,
                consecutive_rate_limits: 0,
            },
        }
    }

    /// Caps the number of consecutive rate-limit retries
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Maps a fetch outcome to the next action, updating internal state
    pub fn classify(&mut self, outcome: &FetchOutcome) -> BackoffAction {
        match outcome {
            FetchOutcome::RateLimited { .. } => {
                if let Some(max) = self.max_retries {
                    if self.state.consecutive_rate_limits >= max {
                        return BackoffAction::GiveUp {
                            attempts: self.state.consecutive_rate_limits,
                        };
                    }
                }

                let wait = self.state.wait;
                self.state.wait = wait.checked_mul(2).unwrap_or(Duration::MAX);
                self.state.consecutive_rate_limits += 1;
                BackoffAction::Retry { wait }
            }
            FetchOutcome::Success(_) | FetchOutcome::Terminal { .. } => {
                self.reset();
                BackoffAction::Proceed
            }
        }
    }

    /// Returns to the `Normal` state
    pub fn reset(&mut self) {
        self.state = BackoffState {
            wait: self.initial,
            consecutive_rate_limits: 0,
        };
    }

    /// Whether at least one rate-limit response is outstanding
    pub fn is_backing_off(&self) -> bool {
        self.state.consecutive_rate_limits > 0
    }

    pub fn state(&self) -> BackoffState {
        self.state
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }
}
