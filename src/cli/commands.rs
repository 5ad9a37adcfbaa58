//! Command definitions and structures for the CLI

use clap::{Parser, Subcommand};
use social_notifier::shared::config::TransportKind;
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "social-notifier")]
#[command(about = "Polls timelines, feeds and logs in the background and shows new items as notifications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (defaults to $SOCIAL_NOTIFIER_HOME or ~/.social-notifier)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Control transport to use instead of the configured one (socket or file)
    #[arg(long, global = true)]
    pub transport: Option<TransportKind>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the daemon
    Start {
        /// Run the daemon in this process instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Add a source, e.g. `add twitter search rust`
    Add {
        /// Source type (twitter, rss, log)
        source_type: String,

        /// Parameters passed to the source
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
    },

    /// Delete a source by its `type:index` address
    Delete {
        /// Address as shown by `list`, e.g. twitter:0
        address: String,
    },

    /// List the active sources
    List,

    /// Check whether the daemon is running
    Status,
}

impl Commands {
    pub fn method(&self) -> &'static str {
        match self {
            Commands::Start { .. } => "start",
            Commands::Stop => "stop",
            Commands::Add { .. } => "add",
            Commands::Delete { .. } => "delete",
            Commands::List => "list",
            Commands::Status => "status",
        }
    }

    /// Control method and parameters sent to the daemon, if this command
    /// goes through the transport
    pub fn to_request(&self) -> Option<(&'static str, Vec<String>)> {
        match self {
            Commands::Add {
                source_type,
                params,
            } => {
                let mut request = vec![source_type.clone()];
                request.extend(params.iter().cloned());
                Some(("add", request))
            }
            Commands::Delete { address } => Some(("delete", vec![address.clone()])),
            Commands::List => Some(("list", Vec::new())),
            Commands::Stop => Some(("stop", Vec::new())),
            Commands::Start { .. } | Commands::Status => None,
        }
    }
}
