//! Control transports between one-shot invocations and the running daemon
//!
//! Both implementations carry the same request (`method` plus parameters)
//! and return the same response text, so a command behaves identically
//! whichever transport is configured.

pub mod file_queue;
pub mod lock;
pub mod socket;

use crate::errors::AppResult;
use crate::shared::config::{TransportConfig, TransportKind};
use crate::shared::paths::DataLayout;
use async_trait::async_trait;

/// Socket request that stops the accept loop and nothing else
pub const QUIT_SENTINEL: &str = "quit";

/// Field separator of a request line
pub const FIELD_SEPARATOR: char = '\t';

/// Daemon-side command handler shared by every transport server
pub trait CommandDispatch: Send + Sync {
    /// Run one command and produce the text sent back to the caller.
    /// Failures are rendered into the text, never returned.
    fn dispatch(&self, method: &str, params: &[String]) -> String;
}

/// Client side of a control transport
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Send one command and wait for the daemon's answer
    ///
    /// # Errors
    ///
    /// `TransportFailure` when the daemon cannot be reached or the exchange
    /// breaks off.
    async fn send(&self, method: &str, params: &[String]) -> AppResult<String>;

    fn name(&self) -> &'static str;
}

/// Client for the configured transport
pub fn client(config: &TransportConfig, layout: &DataLayout) -> Box<dyn ControlTransport> {
    match config.kind {
        TransportKind::Socket => Box::new(socket::SocketClient::new(config.socket_addr())),
        TransportKind::File => Box::new(file_queue::FileQueueClient::new(layout, config)),
    }
}

/// `method\tparam1\tparam2...`, without a line terminator
pub fn encode_request(method: &str, params: &[String]) -> String {
    let mut line = String::from(method);
    for param in params {
        line.push(FIELD_SEPARATOR);
        line.push_str(param);
    }
    line
}

/// Split a request line into method and parameters. Blank lines yield `None`.
pub fn decode_request(line: &str) -> Option<(String, Vec<String>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let mut fields = line.split(FIELD_SEPARATOR).map(str::to_string);
    let method = fields.next()?;
    Some((method, fields.collect()))
}
