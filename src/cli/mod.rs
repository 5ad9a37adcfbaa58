//! CLI module providing command-line interface functionality
//!
//! This module handles argument parsing and routing to the daemon
//! management and control handlers.

pub mod commands;
pub mod context;
pub mod handlers;

use anyhow::Result;
use clap::Parser;
use social_notifier::daemon::DaemonState;

pub use commands::{Cli, Commands};
pub use context::{CliContext, LogRole};
pub use handlers::CommandHandler;

/// Main CLI application following the CliContext pattern
pub struct CliApp;

impl CliApp {
    /// Parse command line arguments and execute the requested command
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();

        let context = CliContext::new(cli.data_dir.clone(), cli.transport, cli.verbose)?;

        // A detaching `start` stays a client; its re-executed child is the master
        let detached_child = handlers::daemon::is_detached_child();
        let foreground = matches!(cli.command, Some(Commands::Start { foreground: true }));
        let role = match DaemonState::for_command(cli.command.as_ref().map(Commands::method)) {
            DaemonState::MasterRunning if foreground || detached_child => LogRole::Master {
                console: !detached_child,
            },
            _ => LogRole::Client,
        };
        let _log_guards = context.init_logging(role)?;

        let handler = CommandHandler::new(context);
        match cli.command {
            Some(command) => handler.handle_command(command).await,
            None => handler.handle_default().await,
        }
    }
}
