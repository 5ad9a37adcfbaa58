//! The long-running master
//!
//! This module provides:
//! - The source registry and one polling worker per source type
//! - The status queue and the deduplicating notification dispatcher
//! - Control command dispatch and the process lifecycle
//! - PID file handling for the single running master

pub mod controller;
pub mod dispatcher;
pub mod pidfile;
pub mod queue;
pub mod registry;
pub mod runtime;
pub mod worker;

pub use controller::{DaemonController, DaemonState, VALID_METHODS};
pub use dispatcher::{DispatcherSettings, NotificationDispatcher};
pub use queue::{status_queue, DedupHistory, StatusReceiver, StatusSender};
pub use registry::{ListingEntry, SourceRegistry};
pub use runtime::{Daemon, RunningDaemon};
