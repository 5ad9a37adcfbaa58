//! Shared-file transport
//!
//! Clients append `<uuid>\t<method>\t<params...>` lines to the requests file.
//! The daemon drains that file on a fixed interval and appends one
//! `<uuid>>` ... `<<uuid` block per request to the responses file, which
//! each client scans for its own block and removes. Both files are guarded by
//! [`FileLock`] sentinels.

use super::lock::FileLock;
use super::{decode_request, encode_request, CommandDispatch, ControlTransport, FIELD_SEPARATOR};
use crate::errors::{AppError, AppResult, ErrorContextExt};
use crate::shared::config::TransportConfig;
use crate::shared::paths::DataLayout;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn block_start(id: &str) -> String {
    format!("{id}>>")
}

fn block_end(id: &str) -> String {
    format!("<<{id}")
}

/// Response block for `id`; the body always ends with a newline unless empty
fn encode_response(id: &str, message: &str) -> String {
    let mut block = format!("{}\n", block_start(id));
    block.push_str(message);
    if !message.is_empty() && !message.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(&block_end(id));
    block.push('\n');
    block
}

/// Cut the block for `id` out of `contents`, returning `(body, remainder)`
fn extract_response(contents: &str, id: &str) -> Option<(String, String)> {
    let start = block_start(id);
    let end = block_end(id);
    let mut body = String::new();
    let mut remainder = String::new();
    let mut state = 0u8; // 0 before, 1 inside, 2 after

    for line in contents.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n');
        match state {
            0 if bare == start => state = 1,
            1 if bare == end => state = 2,
            1 => body.push_str(line),
            _ => remainder.push_str(line),
        }
    }

    (state == 2).then_some((body, remainder))
}

async fn read_or_empty(path: &Path) -> AppResult<String> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).in_file_operation(path, "read"),
    }
}

async fn append(path: &Path, text: &str) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .in_file_operation(path, "open for append")?;
    file.write_all(text.as_bytes())
        .await
        .in_file_operation(path, "append")?;
    file.flush().await.in_file_operation(path, "flush")
}

/// Drop the request line tagged `id`, reporting whether it was still queued
async fn remove_request(path: &Path, id: &str) -> AppResult<bool> {
    let contents = read_or_empty(path).await?;
    let prefix = format!("{id}{FIELD_SEPARATOR}");
    let kept: String = contents
        .split_inclusive('\n')
        .filter(|line| !line.starts_with(&prefix))
        .collect();
    if kept.len() == contents.len() {
        return Ok(false);
    }
    fs::write(path, kept).await.in_file_operation(path, "rewrite")?;
    Ok(true)
}

pub struct FileQueueClient {
    requests: FileLock,
    responses: FileLock,
    retry: Duration,
    timeout: Duration,
}

impl FileQueueClient {
    pub fn new(layout: &DataLayout, config: &TransportConfig) -> Self {
        Self {
            requests: FileLock::for_file(layout.requests_file()),
            responses: FileLock::for_file(layout.responses_file()),
            retry: Duration::from_millis(config.client_retry_ms),
            timeout: Duration::from_millis(config.response_timeout_ms),
        }
    }

    async fn post_request(&self, line: &str) -> AppResult<()> {
        self.requests.acquire(self.retry).await?;
        let result = append(self.requests.target(), line).await;
        self.requests.release().await?;
        result
    }

    /// One non-blocking look at the responses file
    async fn try_take_response(&self, id: &str) -> AppResult<Option<String>> {
        if !self.responses.try_acquire().await? {
            return Ok(None);
        }
        let result = self.take_response_locked(id).await;
        self.responses.release().await?;
        result
    }

    /// Poll for our block for one timeout window
    async fn poll_response(&self, id: &str) -> AppResult<Option<String>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(body) = self.try_take_response(id).await? {
                return Ok(Some(body));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.retry).await;
        }
    }

    /// Remove our request line if the daemon has not drained it yet
    async fn withdraw_request(&self, id: &str) -> AppResult<bool> {
        self.requests.acquire(self.retry).await?;
        let result = remove_request(self.requests.target(), id).await;
        self.requests.release().await?;
        result
    }

    async fn take_response_locked(&self, id: &str) -> AppResult<Option<String>> {
        let path = self.responses.target();
        let contents = read_or_empty(path).await?;
        match extract_response(&contents, id) {
            Some((body, remainder)) => {
                fs::write(path, remainder)
                    .await
                    .in_file_operation(path, "rewrite")?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ControlTransport for FileQueueClient {
    async fn send(&self, method: &str, params: &[String]) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let line = format!("{id}{FIELD_SEPARATOR}{}\n", encode_request(method, params));
        self.post_request(&line)
            .await
            .map_err(|e| AppError::transport_with_source("post request", e))?;

        let read_failed = |e: AppError| AppError::transport_with_source("read response", e);
        if let Some(body) = self.poll_response(&id).await.map_err(read_failed)? {
            return Ok(body);
        }

        // A failed call must not run later against a daemon started afterwards
        let withdrawn = self
            .withdraw_request(&id)
            .await
            .map_err(|e| AppError::transport_with_source("withdraw request", e))?;
        if withdrawn {
            return Err(AppError::transport(format!(
                "no response from daemon within {} ms",
                self.timeout.as_millis()
            )));
        }

        debug!("Request {} was taken by the daemon, waiting for its answer", id);
        if let Some(body) = self.poll_response(&id).await.map_err(read_failed)? {
            return Ok(body);
        }
        Err(AppError::transport(format!(
            "daemon took the request but did not answer within {} ms",
            2 * self.timeout.as_millis()
        )))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

pub struct FileQueueServer {
    requests: FileLock,
    responses: FileLock,
    poll_interval: Duration,
}

impl FileQueueServer {
    pub fn new(layout: &DataLayout, config: &TransportConfig) -> Self {
        Self {
            requests: FileLock::for_file(layout.requests_file()),
            responses: FileLock::for_file(layout.responses_file()),
            poll_interval: Duration::from_millis(config.file_poll_interval_ms),
        }
    }

    pub async fn run(self, dispatch: Arc<dyn CommandDispatch>, shutdown: CancellationToken) {
        info!("Polling {} for requests", self.requests.target().display());

        loop {
            match self.drain_requests().await {
                Ok(lines) => {
                    for line in lines {
                        if let Err(e) = self.answer(&line, dispatch.as_ref(), &shutdown).await {
                            error!("Failed to answer request: {}", e);
                        }
                    }
                }
                Err(e) => warn!("Failed to read requests: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Request polling stopped");
    }

    /// Take every pending request line, leaving the file empty. Skips the
    /// round when a client holds the lock.
    async fn drain_requests(&self) -> AppResult<Vec<String>> {
        let path = self.requests.target();
        if !fs::try_exists(path).await.unwrap_or(false) || !self.requests.try_acquire().await? {
            return Ok(Vec::new());
        }

        let result = Self::take_lines(path).await;
        self.requests.release().await?;
        result
    }

    async fn take_lines(path: &Path) -> AppResult<Vec<String>> {
        let contents = read_or_empty(path).await?;
        if !contents.is_empty() {
            fs::write(path, "").await.in_file_operation(path, "truncate")?;
        }
        Ok(contents.lines().map(str::to_string).collect())
    }

    async fn answer(
        &self,
        line: &str,
        dispatch: &dyn CommandDispatch,
        shutdown: &CancellationToken,
    ) -> AppResult<()> {
        let Some((id, rest)) = line.split_once(FIELD_SEPARATOR) else {
            warn!("Ignoring malformed request line: {}", line);
            return Ok(());
        };
        let message = match decode_request(rest) {
            Some((method, params)) => dispatch.dispatch(&method, &params),
            None => String::new(),
        };

        if !self.responses.acquire_until(self.poll_interval, shutdown).await? {
            return Ok(());
        }
        let result = append(self.responses.target(), &encode_response(id, &message)).await;
        self.responses.release().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Upper;

    impl CommandDispatch for Upper {
        fn dispatch(&self, method: &str, params: &[String]) -> String {
            format!("{}\n{}\n", method.to_uppercase(), params.join(" "))
        }
    }

    fn config() -> TransportConfig {
        TransportConfig {
            file_poll_interval_ms: 10,
            client_retry_ms: 5,
            response_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_response_block_format() {
        assert_eq!(encode_response("u1", "[a:0] x\n"), "u1>>\n[a:0] x\n<<u1\n");
        assert_eq!(encode_response("u1", "no newline"), "u1>>\nno newline\n<<u1\n");
        assert_eq!(encode_response("u1", ""), "u1>>\n<<u1\n");
    }

    #[test]
    fn test_extract_leaves_other_blocks() {
        let contents = format!(
            "{}{}",
            encode_response("other", "theirs\n"),
            encode_response("mine", "line one\nline two\n")
        );
        let (body, remainder) = extract_response(&contents, "mine").unwrap();
        assert_eq!(body, "line one\nline two\n");
        assert_eq!(remainder, "other>>\ntheirs\n<<other\n");

        assert!(extract_response(&remainder, "mine").is_none());
        // A block that has started but not ended is not taken
        assert!(extract_response("mine>>\npartial\n", "mine").is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::at(temp_dir.path());
        let shutdown = CancellationToken::new();

        let server = FileQueueServer::new(&layout, &config());
        let handle = tokio::spawn(server.run(Arc::new(Upper), shutdown.clone()));

        let client = FileQueueClient::new(&layout, &config());
        let response = client
            .send("add", &["twitter".to_string(), "home".to_string()])
            .await
            .unwrap();
        assert_eq!(response, "ADD\ntwitter home\n");

        // The consumed block is gone and no locks are left behind
        assert_eq!(std::fs::read_to_string(layout.responses_file()).unwrap(), "");
        assert!(!FileLock::for_file(layout.requests_file()).is_locked().await);
        assert!(!FileLock::for_file(layout.responses_file()).is_locked().await);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_clients_get_their_own_answers() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::at(temp_dir.path());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            FileQueueServer::new(&layout, &config()).run(Arc::new(Upper), shutdown.clone()),
        );

        let calls: Vec<_> = (0..5)
            .map(|n| {
                let layout = layout.clone();
                tokio::spawn(async move {
                    let client = FileQueueClient::new(&layout, &config());
                    client.send("list", &[format!("client-{n}")]).await
                })
            })
            .collect();

        for (n, call) in calls.into_iter().enumerate() {
            assert_eq!(call.await.unwrap().unwrap(), format!("LIST\nclient-{n}\n"));
        }

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl CommandDispatch for Counting {
        fn dispatch(&self, method: &str, _params: &[String]) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("{method}\n")
        }
    }

    #[tokio::test]
    async fn test_timed_out_request_is_withdrawn() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::at(temp_dir.path());
        let config = TransportConfig {
            response_timeout_ms: 50,
            ..config()
        };

        let err = FileQueueClient::new(&layout, &config)
            .send("stop", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no response from daemon"));
        assert_eq!(std::fs::read_to_string(layout.requests_file()).unwrap(), "");

        // A daemon started afterwards never sees the failed call
        let counting = Arc::new(Counting::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            FileQueueServer::new(&layout, &config).run(counting.clone(), shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert_eq!(read_or_empty(&layout.responses_file()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_remove_request_keeps_other_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("requests");
        std::fs::write(&path, "a\tlist\nb\tstop\nab\tlist\n").unwrap();

        assert!(remove_request(&path, "b").await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\tlist\nab\tlist\n");
        assert!(!remove_request(&path, "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_drained_request_still_gets_late_answer() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::at(temp_dir.path());
        let config = TransportConfig {
            response_timeout_ms: 200,
            ..config()
        };

        let client_layout = layout.clone();
        let call = tokio::spawn(async move {
            FileQueueClient::new(&client_layout, &config)
                .send("list", &[])
                .await
        });

        // Take the request like a daemon would, but answer after the first window
        let requests = FileLock::for_file(layout.requests_file());
        let id = loop {
            tokio::time::sleep(Duration::from_millis(5)).await;
            requests.acquire(Duration::from_millis(5)).await.unwrap();
            let lines = FileQueueServer::take_lines(requests.target()).await.unwrap();
            requests.release().await.unwrap();
            if let Some(line) = lines.first() {
                break line.split_once(FIELD_SEPARATOR).unwrap().0.to_string();
            }
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        let responses = FileLock::for_file(layout.responses_file());
        responses.acquire(Duration::from_millis(5)).await.unwrap();
        append(responses.target(), &encode_response(&id, "late\n"))
            .await
            .unwrap();
        responses.release().await.unwrap();

        assert_eq!(call.await.unwrap().unwrap(), "late\n");
    }
}
