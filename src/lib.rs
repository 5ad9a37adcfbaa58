//! Social Notifier Library
//!
//! A background aggregator: per-type polling workers fetch new items from
//! configured sources, a dispatcher forwards them to a notification sink,
//! and one-shot invocations manage the running daemon over a socket or a
//! shared-file control transport.

pub mod config;
pub mod daemon;
pub mod errors;
pub mod notifier;
pub mod shared;
pub mod sources;
pub mod transport;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use errors::{AppError, AppResult};
pub use shared::config::Config;
pub use shared::paths::DataLayout;
