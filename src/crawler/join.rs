//! Purchase-history join
//!
//! Replays the stored records in the order the walker produced them, derives
//! each record's merchant id and fetches its purchase history. A bad entry is
//! skipped on its own; it never stops the run.

use crate::crawler::retry::{fetch_until_settled, Settled};
use crate::crawler::{FetchClient, HarvestOptions};
use crate::state::{RunState, RunSummary, StopReason};
use crate::storage::{
    CheckpointTracker, PurchaseRecord, PurchaseSink, RecordStore, StorageResult, StoredEntry,
};
use crate::DataShapeError;
use serde_json::Value;

/// Looks up the merchant id at a dotted `path` inside a store payload
///
/// Strings are returned as-is and numbers in their decimal form. A missing
/// or null field, or any other JSON type, is a data error.
pub fn extract_merchant_id(payload: &Value, path: &str) -> Result<String, DataShapeError> {
    let mut node = payload;
    for segment in path.split('.') {
        node = node
            .get(segment)
            .ok_or_else(|| DataShapeError::MissingField {
                path: path.to_string(),
            })?;
    }

    match node {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(DataShapeError::MissingField {
            path: path.to_string(),
        }),
        _ => Err(DataShapeError::UnsupportedType {
            path: path.to_string(),
        }),
    }
}

/// Stage-two driver: joins store records with purchase history
pub struct PurchaseJoin<'a, F, P>
where
    F: FetchClient,
    P: PurchaseSink + ?Sized,
{
    client: &'a F,
    sink: &'a mut P,
    checkpoint: CheckpointTracker,
    options: HarvestOptions,
    state: RunState,
    pending: Vec<PurchaseRecord>,
}

impl<'a, F, P> PurchaseJoin<'a, F, P>
where
    F: FetchClient,
    P: PurchaseSink + ?Sized,
{
    pub fn new(
        client: &'a F,
        sink: &'a mut P,
        checkpoint: CheckpointTracker,
        options: HarvestOptions,
    ) -> Self {
        let state = RunState::new(checkpoint.value(), options.backoff_controller());
        Self {
            client,
            sink,
            checkpoint,
            options,
            state,
            pending: Vec::new(),
        }
    }

    /// Processes every record in `input` from the checkpoint onwards
    ///
    /// Only reading the input can fail; everything after that is logged and
    /// isolated to the entry it happened on.
    pub async fn run<S>(mut self, input: &S) -> StorageResult<RunSummary>
    where
        S: RecordStore + ?Sized,
    {
        let start = self.state.cursor;
        let offset = usize::try_from(start).unwrap_or_else(|_| {
            tracing::warn!("Checkpoint {} is negative; starting from the first entry", start);
            0
        });
        let entries = input.entries_from(offset)?;
        let start = offset as i64;
        tracing::info!(
            "Starting purchase-history join at entry {} ({} entries to go)",
            start,
            entries.len()
        );

        let mut stop = StopReason::InputExhausted;

        for (position, entry) in entries.into_iter().enumerate() {
            let index = start + position as i64;
            self.state.cursor = index;

            let (store_id, merchant_id) = match self.join_key(entry) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!("Skipping store entry {} due to {}", index, e);
                    self.state.counters.skipped += 1;
                    self.save_checkpoint(index + 1);
                    continue;
                }
            };

            let label = format!("storeID: {}, merchantID: {}", store_id, merchant_id);
            let client = self.client;
            let merchant = merchant_id.as_str();
            let settled = fetch_until_settled(&mut self.state, &label, move || {
                client.fetch_purchase_history(merchant, store_id)
            })
            .await;

            match settled {
                Settled::Success(payload) => {
                    self.state.counters.succeeded += 1;
                    self.pending.push(PurchaseRecord {
                        store_id,
                        merchant_id,
                        payload,
                    });
                }
                Settled::Terminal { reason, .. } => {
                    self.state.counters.skipped += 1;
                    tracing::warn!(
                        "Skipping storeID {} due to non-successful response ({})",
                        store_id,
                        reason
                    );
                }
                Settled::GaveUp { .. } => {
                    stop = StopReason::RetriesExhausted { unit: index };
                    break;
                }
            }

            self.flush_pending();
            self.save_checkpoint(index + 1);
            tokio::time::sleep(self.options.request_delay).await;
            self.state.backoff.reset();
        }

        self.shutdown();

        let summary = self.state.finish(self.checkpoint.value(), stop);
        tracing::info!(
            "Purchase-history join finished: {} saved, {} skipped, {} rate limited; \
             next entry {} ({})",
            summary.counters.succeeded,
            summary.counters.skipped,
            summary.counters.rate_limited,
            summary.checkpoint,
            summary.stop
        );
        Ok(summary)
    }

    /// Store id and merchant id of an input entry
    fn join_key(&self, entry: StoredEntry) -> Result<(i64, String), DataShapeError> {
        let record = entry?;
        let merchant_id = extract_merchant_id(&record.payload, &self.options.merchant_id_path)?;
        Ok((record.store_id, merchant_id))
    }

    /// Writes the pending batch; on failure the batch is kept for the next flush
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        match self.sink.append(&self.pending) {
            Ok(()) => self.pending.clear(),
            Err(e) => {
                self.state.counters.persist_failures += 1;
                tracing::error!(
                    "Failed to save {} purchase record(s), will retry on next flush: {}",
                    self.pending.len(),
                    e
                );
            }
        }
    }

    fn save_checkpoint(&mut self, value: i64) {
        if let Err(e) = self.checkpoint.save(value) {
            tracing::error!("Failed to save checkpoint {}: {}", value, e);
        }
    }

    fn shutdown(&mut self) {
        self.flush_pending();
        if !self.pending.is_empty() {
            tracing::error!(
                "{} purchase record(s) could not be saved before exit",
                self.pending.len()
            );
        }
        if let Err(e) = self.sink.flush_purchases() {
            tracing::error!("Final flush of purchase records failed: {}", e);
        }
        if let Err(e) = self.checkpoint.flush() {
            tracing::error!(
                "Final checkpoint write to {} failed: {}",
                self.checkpoint.path().display(),
                e
            );
        }
    }
}
