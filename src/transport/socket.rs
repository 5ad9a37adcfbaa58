//! TCP line transport
//!
//! One connection per command: the client writes a single request line and
//! reads until the daemon closes the connection.

use super::{decode_request, encode_request, CommandDispatch, ControlTransport, QUIT_SENTINEL};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const LISTENER_STOPPED: &str = "Listener stopped\n";

/// Longest request line accepted, newline included
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

pub struct SocketServer {
    listener: TcpListener,
}

impl SocketServer {
    pub async fn bind(addr: &str) -> AppResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::transport_with_source(format!("bind {addr}"), e))?;
        info!("Control socket listening on {}", addr);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::transport_with_source("read listener address", e))
    }

    /// Accept until shutdown or a `quit` request
    pub async fn run(self, dispatch: Arc<dyn CommandDispatch>, shutdown: CancellationToken) {
        let listener_stop = shutdown.child_token();

        loop {
            tokio::select! {
                _ = listener_stop.cancelled() => break,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("Control connection from {}", peer);
                            let dispatch = dispatch.clone();
                            let listener_stop = listener_stop.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, dispatch, listener_stop).await {
                                    error!("Error handling control connection: {}", e);
                                }
                            });
                        }
                        Err(e) => error!("Failed to accept control connection: {}", e),
                    }
                }
            }
        }

        info!("Control socket closed");
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatch: Arc<dyn CommandDispatch>,
    listener_stop: CancellationToken,
) -> AppResult<()> {
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_BYTES));
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| AppError::transport_with_source("read request", e))?;
    if read as u64 >= MAX_REQUEST_BYTES && !line.ends_with('\n') {
        warn!("Dropping control request longer than {} bytes", MAX_REQUEST_BYTES);
        return Ok(());
    }

    let response = match decode_request(&line) {
        Some((method, _)) if method == QUIT_SENTINEL => {
            info!("Received {} request", QUIT_SENTINEL);
            listener_stop.cancel();
            LISTENER_STOPPED.to_string()
        }
        Some((method, params)) => dispatch.dispatch(&method, &params),
        None => return Ok(()),
    };

    let mut stream = reader.into_inner().into_inner();
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| AppError::transport_with_source("write response", e))?;
    stream
        .shutdown()
        .await
        .map_err(|e| AppError::transport_with_source("close connection", e))?;
    Ok(())
}

pub struct SocketClient {
    addr: String,
}

impl SocketClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl ControlTransport for SocketClient {
    async fn send(&self, method: &str, params: &[String]) -> AppResult<String> {
        let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            AppError::transport_with_source(format!("connect to daemon at {}", self.addr), e)
        })?;

        let line = format!("{}\n", encode_request(method, params));
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::transport_with_source("send request", e))?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .map_err(|e| AppError::transport_with_source("read response", e))?;
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "socket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    impl CommandDispatch for Echo {
        fn dispatch(&self, method: &str, params: &[String]) -> String {
            self.seen.lock().push(method.to_string());
            format!("{method}:{}\n", params.join(","))
        }
    }

    async fn serve() -> (SocketAddr, Arc<Echo>, CancellationToken, tokio::task::JoinHandle<()>) {
        let server = SocketServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let echo = Arc::new(Echo::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(echo.clone(), shutdown.clone()));
        (addr, echo, shutdown, handle)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (addr, echo, shutdown, handle) = serve().await;
        let client = SocketClient::new(addr.to_string());

        let response = client
            .send("add", &["twitter".to_string(), "home".to_string()])
            .await
            .unwrap();
        assert_eq!(response, "add:twitter,home\n");
        assert_eq!(echo.seen.lock().clone(), vec!["add".to_string()]);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_quit_stops_listener_only() {
        let (addr, echo, shutdown, handle) = serve().await;
        let client = SocketClient::new(addr.to_string());

        assert_eq!(client.send("quit", &[]).await.unwrap(), LISTENER_STOPPED);
        handle.await.unwrap();
        assert!(echo.seen.lock().is_empty());
        assert!(!shutdown.is_cancelled());

        let err = client.send("list", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::TransportFailure { .. }));
    }

    #[tokio::test]
    async fn test_oversized_request_is_dropped() {
        let (addr, echo, shutdown, handle) = serve().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let oversized = vec![b'a'; MAX_REQUEST_BYTES as usize + 1];
        let _ = stream.write_all(&oversized).await;
        let mut response = Vec::new();
        let read = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stream.read_to_end(&mut response),
        )
        .await
        .unwrap();
        // Closed without an answer; a reset is fine too
        assert!(read.map(|n| n == 0).unwrap_or(true));
        assert!(echo.seen.lock().is_empty());

        let client = SocketClient::new(addr.to_string());
        assert_eq!(client.send("list", &[]).await.unwrap(), "list:\n");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_daemon() {
        // Bind and drop to find a port nobody listens on
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let err = SocketClient::new(addr.to_string())
            .send("list", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Transport failure: connect to daemon"));
    }
}
