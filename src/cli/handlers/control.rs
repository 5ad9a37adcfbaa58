//! Commands answered by the running daemon

use super::super::CliContext;
use anyhow::Result;
use social_notifier::transport;
use tracing::debug;

pub struct ControlHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ControlHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Send one command over the configured transport and print the reply
    /// verbatim. An unreachable daemon is an error (non-zero exit).
    pub async fn send(&self, method: &str, params: &[String]) -> Result<()> {
        let client = transport::client(&self.context.config.transport, &self.context.layout);
        debug!("Sending '{}' over the {} transport", method, client.name());

        let response = client.send(method, params).await?;
        print!("{response}");
        Ok(())
    }
}
