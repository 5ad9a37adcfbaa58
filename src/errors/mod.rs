//! Centralized error handling module
//!
//! Typed errors for the daemon, the control transports and the source
//! adapters. `anyhow` is only used at the CLI edge.

pub mod context;
pub mod types;

pub use context::ErrorContextExt;
pub use types::{AppError, AppResult};
