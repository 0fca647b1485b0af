//! Drives one unit of work through the backoff controller until it settles

use crate::crawler::FetchOutcome;
use crate::state::{BackoffAction, RunState};
use serde_json::Value;
use std::future::Future;

/// Final result of a unit once rate limiting is out of the way
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Settled {
    Success(Value),
    Terminal { status: Option<u16>, reason: String },
    GaveUp { attempts: u32 },
}

/// Repeats `attempt` while the upstream answers with rate limiting
///
/// Sleeps for the wait the backoff controller hands out between attempts.
/// Only a configured retry cap stops the loop early.
pub(crate) async fn fetch_until_settled<A, Fut>(
    state: &mut RunState,
    label: &str,
    mut attempt: A,
) -> Settled
where
    A: FnMut() -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    loop {
        state.counters.attempts += 1;
        let outcome = attempt().await;
        let action = state.backoff.classify(&outcome);

        match (outcome, action) {
            (FetchOutcome::Success(payload), _) => return Settled::Success(payload),
            (FetchOutcome::Terminal { status, reason }, _) => {
                return Settled::Terminal { status, reason }
            }
            (FetchOutcome::RateLimited { status }, BackoffAction::GiveUp { attempts }) => {
                state.counters.rate_limited += 1;
                tracing::error!(
                    "Rate limit (HTTP {}) persisted for {} after {} retries; giving up",
                    status,
                    label,
                    attempts
                );
                return Settled::GaveUp { attempts };
            }
            (FetchOutcome::RateLimited { status }, action) => {
                state.counters.rate_limited += 1;
                if let BackoffAction::Retry { wait } = action {
                    tracing::warn!(
                        "Rate limit hit (HTTP {}). Waiting {:?} to retry {}",
                        status,
                        wait,
                        label
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
