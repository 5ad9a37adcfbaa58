//! Notification dispatcher
//!
//! The single consumer of the status queue. At most one notification is
//! being rendered at any time, and items reach the sink in the order their
//! batches arrived.

use super::queue::{DedupHistory, StatusReceiver};
use crate::notifier::{Notification, NotificationSink};
use crate::shared::config::DaemonConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    pub display_interval: Duration,
    pub idle_interval: Duration,
    pub notification_timeout: Duration,
    pub history_capacity: usize,
}

impl From<&DaemonConfig> for DispatcherSettings {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            display_interval: config.display_interval(),
            idle_interval: config.idle_interval(),
            notification_timeout: config.notification_timeout(),
            history_capacity: config.history_capacity,
        }
    }
}

pub struct NotificationDispatcher {
    queue: StatusReceiver,
    history: DedupHistory,
    sink: Arc<dyn NotificationSink>,
    settings: DispatcherSettings,
    shutdown: CancellationToken,
}

impl NotificationDispatcher {
    pub fn new(
        queue: StatusReceiver,
        sink: Arc<dyn NotificationSink>,
        settings: DispatcherSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            history: DedupHistory::new(settings.history_capacity),
            sink,
            settings,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Notification dispatcher started ({} sink)", self.sink.name());

        loop {
            let pause = match self.queue.pop() {
                Some(item) if self.history.contains(&item.id) => {
                    debug!("Skipping already shown status {}", item.id);
                    continue;
                }
                Some(item) => {
                    let notification = Notification::new(
                        &item.title,
                        &item.body,
                        self.settings.notification_timeout,
                    )
                    .with_icon(item.icon_path.clone());

                    self.sink.notify(&notification).await;
                    self.history.insert(&item.id);
                    info!("{}: {}", item.title, item.body);
                    self.settings.display_interval
                }
                None => self.settings.idle_interval,
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        debug!("Notification dispatcher stopped, {} item(s) left", self.queue.len());
    }
}
