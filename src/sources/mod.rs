//! Source adapters and the factory map that builds them by name
//!
//! An adapter is one configured instance of a source type (`twitter home`,
//! `rss https://...`). The daemon never calls adapters directly; each
//! source type gets a polling worker that calls [`SourceAdapter::fetch_once`]
//! and forwards the resulting batch to the status queue.

pub mod logfile;
pub mod rss;
pub mod twitter;

use crate::errors::{AppError, AppResult};
use crate::shared::config::Config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A single item produced by a source, shown at most once per history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusItem {
    /// Dedup key, global across all source types
    pub id: String,
    pub title: String,
    pub body: String,
    pub icon_path: Option<PathBuf>,
    /// Raw source record, opaque to the daemon
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StatusItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            icon_path: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_icon(mut self, icon_path: impl Into<PathBuf>) -> Self {
        self.icon_path = Some(icon_path.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Why a single fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl FetchError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth {
                status: status.as_u16(),
            },
            other => Self::Status { status: other },
        }
    }

    /// Attach the source label, turning this into the crate-wide error type
    pub fn into_app_error(self, source_type: &str) -> AppError {
        AppError::AdapterRuntime {
            source_type: source_type.to_string(),
            message: self.to_string(),
            source: Some(Box::new(self)),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Outcome of one fetch: an ordered (possibly empty) batch or a failure value
pub type FetchResult = Result<Vec<StatusItem>, FetchError>;

/// Capability set every configured source instance provides
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human readable label used in logs ("Twitter", "RSS", ...)
    fn type_label(&self) -> &str;

    /// Re-check the construction parameters
    fn validate_parameters(&self) -> AppResult<()>;

    /// One-line description shown in listings
    fn describe(&self) -> String;

    /// Fetch whatever is new since the previous call. Must not panic; all
    /// failures are reported through the returned value.
    async fn fetch_once(&mut self) -> FetchResult;
}

/// Builds an adapter from the `add` parameters, validating them
pub type AdapterConstructor =
    Arc<dyn Fn(&[String]) -> AppResult<Box<dyn SourceAdapter>> + Send + Sync>;

/// Factory map from source-type name to adapter constructor
#[derive(Clone, Default)]
pub struct SourceFactories {
    constructors: BTreeMap<String, AdapterConstructor>,
}

impl SourceFactories {
    /// An empty map; every `add` fails with `InvalidSourceType`
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in adapters, configured from `config`
    pub fn builtin(config: &Config) -> Self {
        let mut factories = Self::new();

        let twitter_config = config.sources.twitter.clone();
        factories.register(twitter::SOURCE_TYPE, move |params| {
            twitter::TwitterSource::new(&twitter_config, params)
                .map(|s| Box::new(s) as Box<dyn SourceAdapter>)
        });

        let rss_config = config.sources.rss.clone();
        factories.register(rss::SOURCE_TYPE, move |params| {
            rss::RssSource::new(&rss_config, params).map(|s| Box::new(s) as Box<dyn SourceAdapter>)
        });

        factories.register(logfile::SOURCE_TYPE, |params| {
            logfile::LogFileSource::new(params).map(|s| Box::new(s) as Box<dyn SourceAdapter>)
        });

        factories
    }

    pub fn register<F>(&mut self, source_type: &str, constructor: F)
    where
        F: Fn(&[String]) -> AppResult<Box<dyn SourceAdapter>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(source_type.to_ascii_lowercase(), Arc::new(constructor));
    }

    pub fn source_types(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Construct and validate an adapter for `source_type`
    ///
    /// # Errors
    ///
    /// `InvalidSourceType` for an unknown name, `InvalidParameters` when the
    /// adapter rejects `params`.
    pub fn build(&self, source_type: &str, params: &[String]) -> AppResult<Box<dyn SourceAdapter>> {
        let constructor = self
            .constructors
            .get(&source_type.to_ascii_lowercase())
            .ok_or_else(|| AppError::invalid_source_type(source_type))?;
        let adapter = constructor(params)?;
        adapter.validate_parameters()?;
        Ok(adapter)
    }
}
