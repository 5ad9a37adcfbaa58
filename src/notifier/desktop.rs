//! Desktop notifications through libnotify's `notify-send`

use super::{Notification, NotificationSink};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

const NOTIFY_SEND: &str = "notify-send";

#[derive(Debug, Clone)]
pub struct DesktopSink {
    program: String,
}

impl DesktopSink {
    pub fn new() -> Self {
        Self {
            program: NOTIFY_SEND.to_string(),
        }
    }

    /// Use a different `notify-send` compatible binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(notification: &Notification) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            notification.timeout.as_millis().to_string(),
        ];
        if let Some(icon) = &notification.icon_path {
            args.push("-i".to_string());
            args.push(icon.display().to_string());
        }
        args.push("--".to_string());
        args.push(notification.title.clone());
        args.push(notification.body.clone());
        args
    }
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn notify(&self, notification: &Notification) {
        let result = Command::new(&self.program)
            .args(Self::args(notification))
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => debug!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => debug!("Failed to run {}: {}", self.program, e),
        }
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}
