//! Store identifier walker
//!
//! Walks the identifier space one id at a time starting at the checkpoint,
//! persisting each record and advancing only on success. A terminal response
//! ends the walk; rate limiting retries the same id.

use crate::crawler::retry::{fetch_until_settled, Settled};
use crate::crawler::{FetchClient, HarvestOptions};
use crate::state::{RunState, RunSummary, StopReason};
use crate::storage::{CheckpointTracker, ProgressSource, RecordStore, StorageError, StoreRecord};
use std::path::Path;

/// Where a store walk resumes, in priority order
///
/// The furthest of the stored records and the marker wins, so an id whose
/// record failed to persist is never requested again. `start_id` applies
/// only when neither knows anything.
pub fn resume_sources(max_key: Option<i64>, marker: &Path, start_id: i64) -> Vec<ProgressSource> {
    vec![
        ProgressSource::Furthest(vec![
            ProgressSource::StoreMaxKey(max_key),
            ProgressSource::Marker(marker.to_path_buf()),
        ]),
        ProgressSource::Floor(start_id),
    ]
}

/// Stage-one driver: enumerates store identifiers
pub struct StoreWalker<'a, F, S>
where
    F: FetchClient,
    S: RecordStore + ?Sized,
{
    client: &'a F,
    store: &'a mut S,
    checkpoint: CheckpointTracker,
    options: HarvestOptions,
    state: RunState,
}

impl<'a, F, S> StoreWalker<'a, F, S>
where
    F: FetchClient,
    S: RecordStore + ?Sized,
{
    /// Creates a walker positioned at the checkpoint's current value
    pub fn new(
        client: &'a F,
        store: &'a mut S,
        checkpoint: CheckpointTracker,
        options: HarvestOptions,
    ) -> Self {
        let state = RunState::new(checkpoint.value(), options.backoff_controller());
        Self {
            client,
            store,
            checkpoint,
            options,
            state,
        }
    }

    /// Runs until a terminal response, the configured bound, or the retry cap
    pub async fn run(mut self) -> RunSummary {
        tracing::info!("Starting store walk at storeID {}", self.state.cursor);

        let stop = loop {
            let store_id = self.state.cursor;

            if let Some(max) = self.options.max_store_id {
                if store_id > max {
                    tracing::info!("Reached max-store-id {}", max);
                    break StopReason::Bound { last: max };
                }
            }

            let label = format!("storeID: {}", store_id);
            let client = self.client;
            let settled =
                fetch_until_settled(&mut self.state, &label, move || client.fetch_store(store_id))
                    .await;

            match settled {
                Settled::Success(payload) => {
                    self.persist(StoreRecord { store_id, payload });
                    self.state.counters.succeeded += 1;
                    self.state.cursor = store_id + 1;
                    if let Err(e) = self.checkpoint.save(self.state.cursor) {
                        tracing::error!("Failed to save checkpoint {}: {}", self.state.cursor, e);
                    }
                    tokio::time::sleep(self.options.request_delay).await;
                    self.state.backoff.reset();
                }
                Settled::Terminal { status, reason } => {
                    tracing::info!(
                        "Non-200 response for storeID {} ({}). Stopping the walk.",
                        store_id,
                        reason
                    );
                    break StopReason::Terminal(status);
                }
                Settled::GaveUp { .. } => break StopReason::RetriesExhausted { unit: store_id },
            }
        };

        self.shutdown();

        let summary = self.state.finish(self.checkpoint.value(), stop);
        tracing::info!(
            "Store walk finished: {} stored, {} rate limited, {} write failures; \
             next storeID {} ({})",
            summary.counters.succeeded,
            summary.counters.rate_limited,
            summary.counters.persist_failures,
            summary.checkpoint,
            summary.stop
        );
        summary
    }

    /// Best-effort write; the checkpoint still advances when this fails
    fn persist(&mut self, record: StoreRecord) {
        match self.store.insert(&record) {
            Ok(()) => {}
            Err(StorageError::Duplicate { store_id }) => {
                tracing::warn!(
                    "storeID {} is already stored; keeping the existing record",
                    store_id
                );
            }
            Err(e) => {
                self.state.counters.persist_failures += 1;
                tracing::error!("Failed to store record for storeID {}: {}", record.store_id, e);
            }
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.store.flush_records() {
            tracing::error!("Final flush of store records failed: {}", e);
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
