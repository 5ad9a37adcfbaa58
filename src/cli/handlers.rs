//! Command handlers for all CLI operations
//!
//! Routes parsed commands either to the local daemon management handler
//! or through the control transport to the running daemon.

pub mod control;
pub mod daemon;

use super::{CliContext, Commands};
use anyhow::Result;
use control::ControlHandler;
use daemon::DaemonHandler;

/// Coordinates all command handling operations with dependency injection via CliContext
pub struct CommandHandler {
    context: CliContext,
}

impl CommandHandler {
    pub fn new(context: CliContext) -> Self {
        Self { context }
    }

    /// Route commands to their appropriate handlers
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Start { foreground } => {
                DaemonHandler::new(&self.context).handle_start(foreground).await
            }
            Commands::Status => DaemonHandler::new(&self.context).handle_status(),
            other => {
                let Some((method, params)) = other.to_request() else {
                    return Ok(());
                };
                ControlHandler::new(&self.context).send(method, &params).await
            }
        }
    }

    /// No subcommand: add the configured default source
    pub async fn handle_default(&self) -> Result<()> {
        let params = self.context.config.daemon.default_source.to_add_params();
        ControlHandler::new(&self.context).send("add", &params).await
    }
}
