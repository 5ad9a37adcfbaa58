//! Master process: wires the registry, dispatcher and transport server
//! together and keeps them alive until cancellation

use super::controller::{DaemonController, DaemonState};
use super::dispatcher::{DispatcherSettings, NotificationDispatcher};
use super::pidfile;
use super::queue::status_queue;
use super::registry::SourceRegistry;
use crate::errors::AppResult;
use crate::notifier::{build_sink, Notification, NotificationSink};
use crate::shared::config::{Config, TransportKind};
use crate::shared::paths::DataLayout;
use crate::sources::SourceFactories;
use crate::transport::file_queue::FileQueueServer;
use crate::transport::socket::SocketServer;
use crate::transport::CommandDispatch;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const STARTUP_TITLE: &str = "Social Notifier";
const STARTUP_BODY: &str = "Starting Social Notifier";
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Daemon {
    layout: DataLayout,
    config: Arc<Config>,
    factories: SourceFactories,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Daemon {
    /// A master using the built-in adapters and the configured sink
    pub fn new(layout: DataLayout, config: Arc<Config>) -> Self {
        let factories = SourceFactories::builtin(&config);
        Self {
            layout,
            config,
            factories,
            sink: None,
        }
    }

    pub fn with_factories(mut self, factories: SourceFactories) -> Self {
        self.factories = factories;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start every background task and return once the transport is serving
    ///
    /// # Errors
    ///
    /// Fails when the sink cannot be built or the transport cannot bind.
    pub async fn spawn(self) -> AppResult<RunningDaemon> {
        let shutdown = CancellationToken::new();
        let daemon_config = &self.config.daemon;

        let sink = match self.sink {
            Some(sink) => sink,
            None => build_sink(&self.config.notifier)?,
        };

        let (sender, receiver) = status_queue();
        let registry = Arc::new(SourceRegistry::new(
            self.factories,
            sender,
            daemon_config.poll_interval(),
            shutdown.clone(),
        ));
        let controller = Arc::new(DaemonController::new(
            registry.clone(),
            shutdown.clone(),
            daemon_config.shutdown_grace(),
        ));
        controller.transition(DaemonState::Bootstrapping);

        let mut tasks = Vec::new();
        let dispatch: Arc<dyn CommandDispatch> = controller.clone();
        let socket_addr = match self.config.transport.kind {
            TransportKind::Socket => {
                let server = SocketServer::bind(&self.config.transport.socket_addr()).await?;
                let addr = server.local_addr()?;
                tasks.push(tokio::spawn(server.run(dispatch, shutdown.clone())));
                Some(addr)
            }
            TransportKind::File => {
                let server = FileQueueServer::new(&self.layout, &self.config.transport);
                tasks.push(tokio::spawn(server.run(dispatch, shutdown.clone())));
                None
            }
        };

        let dispatcher = NotificationDispatcher::new(
            receiver,
            sink,
            DispatcherSettings::from(daemon_config),
            shutdown.clone(),
        );
        tasks.push(tokio::spawn(dispatcher.run()));

        for spec in &daemon_config.startup_sources {
            if let Err(e) = registry.add(&spec.source_type, &spec.params) {
                warn!("Skipping startup source '{}': {}", spec.source_type, e);
            }
        }

        controller.transition(DaemonState::MasterRunning);
        Ok(RunningDaemon {
            controller,
            shutdown,
            socket_addr,
            tasks,
        })
    }

    /// Run the master until `stop` or a termination signal
    ///
    /// # Errors
    ///
    /// `DaemonAlreadyRunning` when another master owns the PID file, plus
    /// anything [`Daemon::spawn`] reports.
    pub async fn run(mut self) -> AppResult<()> {
        self.layout.ensure()?;
        let pid_file = self.layout.pid_file();
        let pid = pidfile::claim(&pid_file)?;
        let _pid_guard = scopeguard::guard(pid_file, |path| {
            pidfile::release(&path);
            info!("Daemon cleanup completed");
        });

        info!("===== Social Notifier started (PID: {}) =====", pid);

        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => build_sink(&self.config.notifier)?,
        };
        sink.notify(&Notification::new(STARTUP_TITLE, STARTUP_BODY, STARTUP_TIMEOUT))
            .await;

        let running = self.with_sink(sink).spawn().await?;
        listen_for_signals(running.shutdown_token());
        running.wait().await;

        info!("===== Social Notifier stopped =====");
        Ok(())
    }
}

/// Handle to a spawned master
pub struct RunningDaemon {
    controller: Arc<DaemonController>,
    shutdown: CancellationToken,
    socket_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningDaemon {
    pub fn controller(&self) -> &Arc<DaemonController> {
        &self.controller
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bound address when serving the socket transport
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket_addr
    }

    /// Cancel immediately, skipping the `stop` grace period
    pub fn shutdown(&self) {
        self.controller.transition(DaemonState::Stopping);
        self.shutdown.cancel();
    }

    /// Wait for cancellation, then for every task to wind down
    pub async fn wait(self) {
        self.shutdown.cancelled().await;
        self.controller.transition(DaemonState::Stopping);

        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Daemon task ended abnormally: {}", e);
            }
        }
        self.controller.registry().join_workers().await;
        self.controller.transition(DaemonState::Terminated);
    }
}

/// SIGINT and SIGTERM cancel the daemon; SIGKILL cannot be intercepted
fn listen_for_signals(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut terminate, mut hangup) =
                match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                    (Ok(terminate), Ok(hangup)) => (terminate, hangup),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for Ctrl+C: {}", e);
                            return;
                        }
                        info!("Received SIGINT, stopping daemon");
                        break;
                    }
                    _ = terminate.recv() => {
                        info!("Received SIGTERM, stopping daemon");
                        break;
                    }
                    _ = hangup.recv() => info!("Received SIGHUP, ignoring"),
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl+C: {}", e);
                        return;
                    }
                    info!("Received Ctrl+C, stopping daemon");
                }
            }
        }

        shutdown.cancel();
    });
}
