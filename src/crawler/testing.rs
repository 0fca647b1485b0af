//! Scripted fetch client for engine tests

use crate::crawler::{FetchClient, FetchOutcome};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Store(i64),
    Purchase { merchant_id: String, store_id: i64 },
}

/// Replays canned outcomes and records every request it receives
///
/// Store requests consume `store_script` in order; once it runs dry every
/// further store request gets a 404. Purchase requests consume the queue
/// registered for their store id and default to an empty success.
#[derive(Default)]
pub struct ScriptedClient {
    store_script: RefCell<VecDeque<FetchOutcome>>,
    purchase_scripts: RefCell<HashMap<i64, VecDeque<FetchOutcome>>>,
    calls: RefCell<Vec<(Call, Instant)>>,
}

impl ScriptedClient {
    pub fn stores(script: Vec<FetchOutcome>) -> Self {
        Self {
            store_script: RefCell::new(script.into()),
            ..Self::default()
        }
    }

    pub fn purchases(scripts: Vec<(i64, Vec<FetchOutcome>)>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|(store_id, script)| (store_id, script.into()))
            .collect();
        Self {
            purchase_scripts: RefCell::new(scripts),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.borrow().iter().map(|(_, t)| *t).collect()
    }

    pub fn store_ids(&self) -> Vec<i64> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(c, _)| match c {
                Call::Store(id) => Some(*id),
                Call::Purchase { .. } => None,
            })
            .collect()
    }

    pub fn purchase_store_ids(&self) -> Vec<i64> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(c, _)| match c {
                Call::Purchase { store_id, .. } => Some(*store_id),
                Call::Store(_) => None,
            })
            .collect()
    }
}

impl FetchClient for ScriptedClient {
    async fn fetch_store(&self, store_id: i64) -> FetchOutcome {
        self.calls
            .borrow_mut()
            .push((Call::Store(store_id), Instant::now()));
        self.store_script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| status(404))
    }

    async fn fetch_purchase_history(&self, merchant_id: &str, store_id: i64) -> FetchOutcome {
        self.calls.borrow_mut().push((
            Call::Purchase {
                merchant_id: merchant_id.to_string(),
                store_id,
            },
            Instant::now(),
        ));
        self.purchase_scripts
            .borrow_mut()
            .get_mut(&store_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| FetchOutcome::Success(json!({"items": []})))
    }
}

/// A store payload carrying merchant `m-<id>`
pub fn store_payload(store_id: i64) -> Value {
    json!({"store": {"storeID": store_id, "merchantID": format!("m-{}", store_id)}})
}

pub fn ok(store_id: i64) -> FetchOutcome {
    FetchOutcome::Success(store_payload(store_id))
}

pub fn rate_limited() -> FetchOutcome {
    FetchOutcome::RateLimited { status: 403 }
}

pub fn status(code: u16) -> FetchOutcome {
    FetchOutcome::Terminal {
        status: Some(code),
        reason: format!("HTTP {}", code),
    }
}

/// Asserts two virtual-clock durations agree to within a millisecond tick
pub fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
