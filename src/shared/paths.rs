//! Layout of the per-user data directory
//!
//! ```text
//! ~/.social-notifier/
//!   config.toml
//!   daemon.pid
//!   requests        requests.lock
//!   responses       responses.lock
//!   log/activity.log
//!   log/debug.log
//! ```

use crate::errors::{AppError, AppResult};
use directories::BaseDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SOCIAL_NOTIFIER_HOME";

const DATA_DIR_NAME: &str = ".social-notifier";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Resolve the data directory: explicit path, then `SOCIAL_NOTIFIER_HOME`,
    /// then `~/.social-notifier`
    pub fn resolve(explicit: Option<PathBuf>) -> AppResult<Self> {
        if let Some(root) = explicit {
            return Ok(Self { root });
        }
        if let Some(root) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self {
                root: PathBuf::from(root),
            });
        }
        let base_dirs =
            BaseDirs::new().ok_or_else(|| AppError::config("Failed to get base directories"))?;
        Ok(Self {
            root: base_dirs.home_dir().join(DATA_DIR_NAME),
        })
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the data and log directories if they are missing
    pub fn ensure(&self) -> AppResult<()> {
        fs::create_dir_all(self.log_dir())
            .map_err(|e| AppError::io_with_source(self.log_dir(), "create data directory", e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    pub fn requests_file(&self) -> PathBuf {
        self.root.join("requests")
    }

    pub fn responses_file(&self) -> PathBuf {
        self.root.join("responses")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn activity_log(&self) -> PathBuf {
        self.log_dir().join("activity.log")
    }

    pub fn debug_log(&self) -> PathBuf {
        self.log_dir().join("debug.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::at("/home/me/.social-notifier");
        assert_eq!(
            layout.requests_file(),
            PathBuf::from("/home/me/.social-notifier/requests")
        );
        assert_eq!(
            layout.debug_log(),
            PathBuf::from("/home/me/.social-notifier/log/debug.log")
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let layout = DataLayout::resolve(Some(PathBuf::from("/srv/notifier"))).unwrap();
        assert_eq!(layout.root(), Path::new("/srv/notifier"));
    }

    #[test]
    fn test_ensure_creates_log_dir() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::at(temp_dir.path().join("data"));
        layout.ensure().unwrap();
        assert!(layout.log_dir().is_dir());
    }
}
