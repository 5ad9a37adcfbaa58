use super::{Notification, NotificationSink};
use async_trait::async_trait;
use tracing::info;

/// Writes notifications to the activity log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) {
        info!(target: "notification", "{}: {}", notification.title, notification.body);
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
