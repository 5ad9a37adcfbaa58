//! Notification sinks
//!
//! A sink renders one notification at a time and never reports failure back
//! to the dispatcher; delivery problems are logged and swallowed.

pub mod desktop;
pub mod log;
pub mod ntfy;
pub mod templates;

use crate::errors::AppResult;
use crate::shared::config::{NotifierConfig, NotifierKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What the dispatcher hands to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, timeout: Duration) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon_path: None,
            timeout,
        }
    }

    pub fn with_icon(mut self, icon_path: Option<PathBuf>) -> Self {
        self.icon_path = icon_path;
        self
    }
}

/// Best-effort, fire-and-forget notification renderer
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification);

    fn name(&self) -> &'static str;
}

/// Build the sink selected by `[notifier] kind`
pub fn build_sink(config: &NotifierConfig) -> AppResult<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = match config.kind {
        NotifierKind::Desktop => Arc::new(desktop::DesktopSink::new()),
        NotifierKind::Ntfy => Arc::new(ntfy::NtfySink::new(&config.ntfy, &config.templates)?),
        NotifierKind::Log => Arc::new(log::LogSink),
    };
    Ok(sink)
}

/// Keeps every notification in memory instead of rendering it
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.received.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: &Notification) {
        self.received.lock().push(notification.clone());
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sink_by_kind() {
        let mut config = NotifierConfig::default();
        assert_eq!(build_sink(&config).unwrap().name(), "desktop");

        config.kind = NotifierKind::Log;
        assert_eq!(build_sink(&config).unwrap().name(), "log");

        config.kind = NotifierKind::Ntfy;
        assert_eq!(build_sink(&config).unwrap().name(), "ntfy");
    }

    #[test]
    fn test_bad_ntfy_url_is_rejected() {
        let mut config = NotifierConfig::default();
        config.kind = NotifierKind::Ntfy;
        config.ntfy.server_url = "not a url".to_string();
        assert!(build_sink(&config).is_err());
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.notify(&Notification::new("a", "b", Duration::from_secs(5)))
            .await;
        assert_eq!(sink.titles(), vec!["a".to_string()]);
    }
}
