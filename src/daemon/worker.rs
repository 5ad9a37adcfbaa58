//! Polling worker: one per source type
//!
//! Visits the type's slots in index order, calls `fetch_once` on every live
//! adapter and forwards non-empty batches to the status queue. A failed
//! fetch is logged and the pass continues with the next slot.

use super::queue::StatusSender;
use super::registry::SourceGroup;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct PollingWorker {
    group: Arc<SourceGroup>,
    queue: StatusSender,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl PollingWorker {
    pub fn new(
        group: Arc<SourceGroup>,
        queue: StatusSender,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            group,
            queue,
            poll_interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        debug!("Polling worker for '{}' started", self.group.source_type());

        'outer: loop {
            let mut index = 0;
            // Re-read the length each step so slots added mid-pass are polled
            while index < self.group.slot_count() {
                let slot = self.group.slot(index);
                index += 1;

                let Some(Some(adapter)) = slot else {
                    continue;
                };

                // The slot lock is already released; only this adapter is held
                let mut adapter = adapter.lock().await;
                let label = adapter.type_label().to_string();
                let result = tokio::select! {
                    _ = self.shutdown.cancelled() => break 'outer,
                    result = adapter.fetch_once() => result,
                };
                drop(adapter);

                match result {
                    Ok(items) if items.is_empty() => {}
                    Ok(items) => {
                        info!("Retrieved {} new {} update(s).", items.len(), label);
                        if !self.queue.push_batch(items) {
                            debug!("Status queue closed, dropping batch");
                        }
                    }
                    Err(e) => {
                        let err = e.into_app_error(&label);
                        warn!("{}: API Exception: {}", label, err);
                    }
                }

                if !self.pause().await {
                    break 'outer;
                }
            }

            if !self.pause().await {
                break;
            }
        }

        debug!("Polling worker for '{}' stopped", self.group.source_type());
    }

    /// Sleep one pacing interval; false once shutdown was requested
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}
