//! Daemon lifecycle state and control command dispatch

use super::registry::SourceRegistry;
use crate::errors::{AppError, AppResult};
use crate::transport::CommandDispatch;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Methods accepted by the control plane
pub const VALID_METHODS: [&str; 5] = ["add", "delete", "list", "start", "stop"];

pub const STOP_ACKNOWLEDGEMENT: &str = "Daemon stopping\n";

/// Process lifecycle
///
/// ```text
/// Unstarted -> Bootstrapping -> MasterRunning -> Stopping -> Terminated
///                            \-> OneShotChild
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Unstarted,
    Bootstrapping,
    MasterRunning,
    OneShotChild,
    Stopping,
    Terminated,
}

impl DaemonState {
    /// Role of an invocation: `start` becomes the master, everything else
    /// (including no command at all) is a one-shot client
    pub fn for_command(method: Option<&str>) -> Self {
        match method {
            Some("start") => Self::MasterRunning,
            _ => Self::OneShotChild,
        }
    }

    fn can_become(self, next: Self) -> bool {
        use DaemonState::*;
        matches!(
            (self, next),
            (Unstarted, Bootstrapping)
                | (Bootstrapping, MasterRunning)
                | (Bootstrapping, OneShotChild)
                | (MasterRunning, Stopping)
                | (Stopping, Terminated)
        )
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Bootstrapping => "bootstrapping",
            Self::MasterRunning => "running",
            Self::OneShotChild => "one-shot",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Daemon side of the control plane
pub struct DaemonController {
    registry: Arc<SourceRegistry>,
    shutdown: CancellationToken,
    shutdown_grace: Duration,
    state: Mutex<DaemonState>,
}

impl DaemonController {
    pub fn new(
        registry: Arc<SourceRegistry>,
        shutdown: CancellationToken,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            registry,
            shutdown,
            shutdown_grace,
            state: Mutex::new(DaemonState::Unstarted),
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn state(&self) -> DaemonState {
        *self.state.lock()
    }

    /// Move to `next`; illegal transitions are ignored and reported as false
    pub fn transition(&self, next: DaemonState) -> bool {
        let mut state = self.state.lock();
        if state.can_become(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Run one control command
    ///
    /// # Errors
    ///
    /// `InvalidCommand` for unknown methods, `DaemonAlreadyRunning` for
    /// `start`, and whatever `add` reports for bad sources.
    pub fn execute(&self, method: &str, params: &[String]) -> AppResult<String> {
        let method = method.to_ascii_lowercase();
        if !VALID_METHODS.contains(&method.as_str()) {
            return Err(AppError::invalid_command(method));
        }

        match method.as_str() {
            "add" => {
                let (source_type, adapter_params) = params
                    .split_first()
                    .ok_or_else(|| AppError::invalid_source_type(""))?;
                self.registry.add(source_type, adapter_params)?;
            }
            "delete" => {
                if let Some(address) = params.first() {
                    self.registry.delete_address(address);
                }
            }
            "start" => {
                return Err(AppError::DaemonAlreadyRunning {
                    pid: Some(std::process::id()),
                })
            }
            "stop" => {
                self.schedule_stop();
                return Ok(STOP_ACKNOWLEDGEMENT.to_string());
            }
            _ => {}
        }

        Ok(self.registry.render_listing())
    }

    /// Reply first, then log, wait out the grace period and cancel
    fn schedule_stop(&self) {
        if !self.transition(DaemonState::Stopping) {
            warn!("Stop requested while {}", self.state());
        }
        let shutdown = self.shutdown.clone();
        let grace = self.shutdown_grace;
        tokio::spawn(async move {
            info!("Shutting down...");
            tokio::time::sleep(grace).await;
            shutdown.cancel();
        });
    }
}

impl CommandDispatch for DaemonController {
    fn dispatch(&self, method: &str, params: &[String]) -> String {
        info!("New request: {} {}", method, params.join(" "));
        match self.execute(method, params) {
            Ok(response) => response,
            Err(e) => {
                if e.is_client_error() {
                    info!("Rejected request: {}", e);
                } else {
                    warn!("[{}] {}", e.category(), e);
                }
                format!("Error: {e}\n")
            }
        }
    }
}
