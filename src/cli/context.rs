//! CLI Context for dependency injection and shared state
//!
//! Resolves the data directory, loads the configuration once and owns the
//! logging setup for both roles an invocation can take.

use anyhow::{Context, Result};
use social_notifier::config::ConfigManager;
use social_notifier::shared::config::{Config, TransportKind};
use social_notifier::shared::paths::DataLayout;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Which logging setup an invocation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRole {
    /// One-shot client: warnings to stderr
    Client,
    /// Master: activity and debug files, plus stdout when in the foreground
    Master { console: bool },
}

/// CLI execution context containing shared dependencies and configuration
#[derive(Clone)]
pub struct CliContext {
    pub layout: DataLayout,
    pub verbose: bool,
    pub config: Arc<Config>,
}

impl CliContext {
    /// Load the configuration, applying a command line transport override
    pub fn new(
        data_dir: Option<PathBuf>,
        transport: Option<TransportKind>,
        verbose: bool,
    ) -> Result<Self> {
        let layout = DataLayout::resolve(data_dir)?;
        let mut config = ConfigManager::load(&layout)
            .context("Failed to load configuration")?
            .into_config();
        if let Some(kind) = transport {
            config.transport.kind = kind;
        }

        Ok(Self {
            layout,
            verbose,
            config: Arc::new(config),
        })
    }

    /// Initialize logging; the returned guards must live until exit so the
    /// file writers flush
    pub fn init_logging(&self, role: LogRole) -> Result<Vec<WorkerGuard>> {
        match role {
            LogRole::Client => {
                let level = if self.verbose { "debug" } else { "warn" };
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(
                        EnvFilter::from_default_env().add_directive(
                            level.parse().unwrap_or_else(|_| tracing::Level::WARN.into()),
                        ),
                    )
                    .init();
                Ok(Vec::new())
            }
            LogRole::Master { console } => self.init_master_logging(console),
        }
    }

    fn init_master_logging(&self, console: bool) -> Result<Vec<WorkerGuard>> {
        let log_dir = self.layout.log_dir();
        std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

        let (activity_writer, activity_guard) = file_writer(&self.layout.activity_log());
        let (debug_writer, debug_guard) = file_writer(&self.layout.debug_log());

        let activity_layer = tracing_subscriber::fmt::layer()
            .with_writer(activity_writer)
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::INFO);

        let debug_layer = tracing_subscriber::fmt::layer()
            .with_writer(debug_writer)
            .with_ansi(false)
            .with_filter(LevelFilter::DEBUG);

        let console_layer = console.then(|| {
            let level = if self.verbose {
                "debug"
            } else {
                self.config.daemon.log_level.as_str()
            };
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    EnvFilter::from_default_env().add_directive(
                        level.parse().unwrap_or_else(|_| tracing::Level::INFO.into()),
                    ),
                )
        });

        tracing_subscriber::registry()
            .with(activity_layer)
            .with(debug_layer)
            .with(console_layer)
            .init();

        if self.verbose {
            tracing::debug!("Verbose logging enabled");
            tracing::debug!("Data directory: {}", self.layout.root().display());
        }

        Ok(vec![activity_guard, debug_guard])
    }
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("social-notifier.log"));
    tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_creation() {
        let temp_dir = TempDir::new().unwrap();
        let context = CliContext::new(Some(temp_dir.path().to_path_buf()), None, false).unwrap();

        assert_eq!(context.layout.root(), temp_dir.path());
        assert!(!context.verbose);
        assert!(context.layout.config_file().exists());
        assert_eq!(context.config.transport.kind, TransportKind::Socket);
    }

    #[test]
    fn test_transport_override() {
        let temp_dir = TempDir::new().unwrap();
        let context = CliContext::new(
            Some(temp_dir.path().to_path_buf()),
            Some(TransportKind::File),
            true,
        )
        .unwrap();

        assert!(context.verbose);
        assert_eq!(context.config.transport.kind, TransportKind::File);
    }
}
