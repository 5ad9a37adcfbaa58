//! Daemon management handler
//!
//! Starting (detached or in the foreground) and status checks. Stopping goes
//! through the control transport like every other daemon command.

use super::super::CliContext;
use anyhow::{Context, Result};
use social_notifier::daemon::{pidfile, Daemon};
use std::process;
use std::time::Duration;
use tracing::{debug, info};

/// Set on the re-executed child of a detaching `start`
pub const DETACHED_ENV: &str = "SOCIAL_NOTIFIER_DETACHED";

/// How long the bootstrap process watches the child for an early exit
const STARTUP_CHECK_DELAY: Duration = Duration::from_millis(500);

/// Whether this process is the re-executed background child
pub fn is_detached_child() -> bool {
    std::env::var_os(DETACHED_ENV).is_some()
}

/// Handler for daemon operations
pub struct DaemonHandler<'a> {
    context: &'a CliContext,
}

impl<'a> DaemonHandler<'a> {
    /// Create new daemon handler
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Handle daemon start command
    pub async fn handle_start(&self, foreground: bool) -> Result<()> {
        if foreground || is_detached_child() {
            self.start_daemon_foreground().await
        } else {
            self.start_daemon_detached()
        }
    }

    /// Handle daemon status command
    pub fn handle_status(&self) -> Result<()> {
        match pidfile::running_pid(&self.context.layout.pid_file())? {
            Some(pid) => println!("Daemon is running (PID: {pid})"),
            None => println!("Daemon is not running"),
        }
        Ok(())
    }

    /// Re-execute this binary as a background master and return
    fn start_daemon_detached(&self) -> Result<()> {
        let layout = &self.context.layout;
        if let Some(pid) = pidfile::running_pid(&layout.pid_file())? {
            anyhow::bail!(
                "Daemon is already running with PID: {}. Stop it first with 'social-notifier stop'",
                pid
            );
        }
        debug!("No existing daemon found, proceeding with startup");

        let current_exe =
            std::env::current_exe().context("Failed to get current executable path")?;

        let mut command = process::Command::new(&current_exe);
        command
            .arg("--data-dir")
            .arg(layout.root())
            .arg("--transport")
            .arg(self.context.config.transport.kind.as_str())
            .arg("start")
            .arg("--foreground");
        if self.context.verbose {
            command.arg("--verbose");
        }
        let mut child = command
            .env(DETACHED_ENV, "1")
            .stdin(process::Stdio::null())
            .stdout(process::Stdio::null())
            .stderr(process::Stdio::null())
            .spawn()
            .context("Failed to spawn daemon process")?;

        // Wait briefly to see if the child process fails immediately
        std::thread::sleep(STARTUP_CHECK_DELAY);

        match child.try_wait()? {
            Some(exit_status) => {
                anyhow::bail!("Daemon process exited immediately: {}", exit_status)
            }
            None => println!("Daemon started successfully with PID: {}", child.id()),
        }

        Ok(())
    }

    /// Run the master in this process until it is stopped
    async fn start_daemon_foreground(&self) -> Result<()> {
        if is_detached_child() {
            // Leave the terminal's session so hangups do not reach us
            #[cfg(unix)]
            unsafe {
                if libc::setsid() == -1 {
                    anyhow::bail!("Failed to create new session");
                }
            }
        } else {
            println!("Starting daemon in foreground...");
        }

        info!("Daemon starting with PID: {}", process::id());
        Daemon::new(self.context.layout.clone(), self.context.config.clone())
            .run()
            .await?;
        Ok(())
    }
}
