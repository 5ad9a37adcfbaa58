//! Common test utilities and helpers
//!
//! Reusable pieces for the integration tests: a builder around the
//! binary, isolated data directories and scripted source adapters.

#![allow(dead_code)]

use assert_cmd::Command;
use async_trait::async_trait;
use social_notifier::errors::{AppError, AppResult};
use social_notifier::sources::{FetchResult, SourceAdapter, SourceFactories, StatusItem};
use std::path::Path;
use tempfile::TempDir;

/// Test command builder for the social-notifier binary
pub struct TestCommand {
    cmd: Command,
}

impl TestCommand {
    pub fn new() -> Self {
        let cmd = Command::cargo_bin("social-notifier").expect("Failed to find social-notifier binary");
        Self { cmd }
    }

    /// Point the binary at an isolated data directory
    pub fn data_dir(mut self, dir: &Path) -> Self {
        self.cmd.arg("--data-dir").arg(dir);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.cmd.arg(arg.as_ref());
        }
        self
    }

    pub fn assert(mut self) -> assert_cmd::assert::Assert {
        self.cmd.assert()
    }
}

impl Default for TestCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Data directory with a `config.toml` written from `config`
pub fn data_dir_with_config(config: &str) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), config).expect("Failed to write config");
    temp_dir
}

/// A local port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("No local address").port()
}

/// Adapter whose fetch returns the same items every time, one per label
/// parameter, so only deduplication keeps them from being shown again
pub struct Repeating {
    labels: Vec<String>,
    emit: bool,
}

#[async_trait]
impl SourceAdapter for Repeating {
    fn type_label(&self) -> &str {
        "Mock"
    }

    fn validate_parameters(&self) -> AppResult<()> {
        if self.labels.is_empty() {
            return Err(AppError::invalid_parameters("mock", "Label is required"));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Mock: {}", self.labels.join(" "))
    }

    async fn fetch_once(&mut self) -> FetchResult {
        if !self.emit {
            return Ok(Vec::new());
        }
        Ok(self
            .labels
            .iter()
            .map(|label| StatusItem::new(format!("mock:{label}"), label.clone(), format!("body of {label}")))
            .collect())
    }
}

/// `mock` and `other` adapters that never emit, `repeat` which emits its
/// labels on every fetch
pub fn mock_factories() -> SourceFactories {
    let mut factories = SourceFactories::new();
    for (name, emit) in [("mock", false), ("other", false), ("repeat", true)] {
        factories.register(name, move |params| {
            let adapter = Repeating {
                labels: params.to_vec(),
                emit,
            };
            Ok(Box::new(adapter) as Box<dyn SourceAdapter>)
        });
    }
    factories
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
