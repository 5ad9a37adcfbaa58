//! Advisory `.lock` sentinel files
//!
//! A file is locked while `<file>.lock` exists. Locks are poll-based and
//! non-reentrant, carry no owner and never expire: a process that dies while
//! holding one leaves the target unusable until the sentinel is removed by
//! hand.

use crate::errors::{AppResult, ErrorContextExt};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FileLock {
    target: PathBuf,
    sentinel: PathBuf,
}

impl FileLock {
    pub fn for_file(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let mut sentinel = OsString::from(target.as_os_str());
        sentinel.push(".lock");
        Self {
            target,
            sentinel: PathBuf::from(sentinel),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn sentinel(&self) -> &Path {
        &self.sentinel
    }

    pub async fn is_locked(&self) -> bool {
        fs::try_exists(&self.sentinel).await.unwrap_or(false)
    }

    /// Create the sentinel if nobody holds it; false when already locked
    pub async fn try_acquire(&self) -> AppResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.sentinel)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).in_file_operation(&self.sentinel, "create lock file"),
        }
    }

    /// Poll until the lock is ours. There is no timeout.
    pub async fn acquire(&self, retry: Duration) -> AppResult<()> {
        while !self.try_acquire().await? {
            tokio::time::sleep(retry).await;
        }
        Ok(())
    }

    /// Like [`FileLock::acquire`], but gives up with `Ok(false)` on shutdown
    pub async fn acquire_until(&self, retry: Duration, shutdown: &CancellationToken) -> AppResult<bool> {
        loop {
            if self.try_acquire().await? {
                return Ok(true);
            }
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(false),
                _ = tokio::time::sleep(retry) => {}
            }
        }
    }

    pub async fn release(&self) -> AppResult<()> {
        match fs::remove_file(&self.sentinel).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).in_file_operation(&self.sentinel, "remove lock file"),
        }
    }
}
