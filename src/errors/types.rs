//! Error types for the social-notifier daemon and its control clients
//!
//! Variants are grouped by where they surface: the control plane (bad
//! commands, unknown sources, unreachable daemon), source adapters, and
//! the ambient configuration/IO layer.

use std::path::PathBuf;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Control-plane errors, rendered back to the calling invocation
    #[error("Invalid command: '{method}'")]
    InvalidCommand { method: String },

    #[error("Invalid source type: '{source_type}'")]
    InvalidSourceType { source_type: String },

    #[error("Invalid parameters for '{source_type}': {reason}")]
    InvalidParameters { source_type: String, reason: String },

    #[error("Transport failure: {operation}")]
    TransportFailure {
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Daemon is already running{}", .pid.map(|p| format!(" (PID: {p})")).unwrap_or_default())]
    DaemonAlreadyRunning { pid: Option<u32> },

    // Source adapter errors, contained inside their polling worker
    #[error("{source_type}: fetch failed: {message}")]
    AdapterRuntime {
        source_type: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TOML parsing error: {context}")]
    TomlParsing {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // I/O errors
    #[error("File I/O error for '{path}': {operation}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_command(method: impl Into<String>) -> Self {
        Self::InvalidCommand {
            method: method.into(),
        }
    }

    pub fn invalid_source_type(source_type: impl Into<String>) -> Self {
        Self::InvalidSourceType {
            source_type: source_type.into(),
        }
    }

    pub fn invalid_parameters(source_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            source_type: source_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a new TransportFailure error
    pub fn transport(operation: impl Into<String>) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            source: None,
        }
    }

    /// Create a new TransportFailure error with source
    pub fn transport_with_source(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new Config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new Io error with source
    pub fn io_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Errors a control client caused, as opposed to daemon-side faults
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCommand { .. }
                | Self::InvalidSourceType { .. }
                | Self::InvalidParameters { .. }
                | Self::DaemonAlreadyRunning { .. }
        )
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidCommand { .. }
            | Self::InvalidSourceType { .. }
            | Self::InvalidParameters { .. }
            | Self::DaemonAlreadyRunning { .. } => "command",
            Self::TransportFailure { .. } => "transport",
            Self::AdapterRuntime { .. } => "adapter",
            Self::Config { .. } | Self::TomlParsing { .. } => "config",
            Self::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let operation = match err.kind() {
            std::io::ErrorKind::NotFound => "file not found",
            std::io::ErrorKind::PermissionDenied => "permission denied",
            std::io::ErrorKind::ConnectionRefused => "connection refused",
            std::io::ErrorKind::ConnectionAborted => "connection aborted",
            std::io::ErrorKind::TimedOut => "timeout",
            _ => "I/O operation",
        }
        .to_string();

        Self::Io {
            path: PathBuf::from("unknown"),
            operation,
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::TomlParsing {
            context: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
