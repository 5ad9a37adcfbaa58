//! PID file handling for the single running master

use crate::errors::{AppError, AppResult, ErrorContextExt};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

const CLAIM_ATTEMPTS: usize = 3;

pub fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;

        // kill -0 only checks that the process exists
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        Command::new("tasklist")
            .arg("/FI")
            .arg(format!("PID eq {pid}"))
            .output()
            .map(|output| {
                output.status.success()
                    && String::from_utf8_lossy(&output.stdout).contains(&pid.to_string())
            })
            .unwrap_or(false)
    }
}

/// PID of the live master, removing stale or malformed PID files
pub fn running_pid(pid_file: &Path) -> AppResult<Option<u32>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(pid_file).in_file_operation(pid_file, "read PID file")?;
    match contents.trim().parse::<u32>() {
        Ok(pid) if is_process_running(pid) => Ok(Some(pid)),
        _ => {
            if let Err(e) = fs::remove_file(pid_file) {
                warn!("Failed to remove stale PID file: {}", e);
            }
            Ok(None)
        }
    }
}

/// Record this process as the master
///
/// The PID is written to a private file first and hard-linked into place,
/// so the PID file never exists without its contents and only one of two
/// racing masters can create it.
///
/// # Errors
///
/// `DaemonAlreadyRunning` when another live process owns the PID file.
pub fn claim(pid_file: &Path) -> AppResult<u32> {
    let pid = std::process::id();
    let staged = staging_path(pid_file, pid);
    fs::write(&staged, pid.to_string()).in_file_operation(&staged, "write PID file")?;
    let staged = scopeguard::guard(staged, |path| {
        let _ = fs::remove_file(path);
    });

    for _ in 0..CLAIM_ATTEMPTS {
        match fs::hard_link(&*staged, pid_file) {
            Ok(()) => return Ok(pid),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match running_pid(pid_file)? {
                    Some(existing) if existing == pid => return Ok(pid),
                    Some(existing) => {
                        return Err(AppError::DaemonAlreadyRunning {
                            pid: Some(existing),
                        })
                    }
                    // Stale file removed, try again
                    None => {}
                }
            }
            Err(e) => return Err(e).in_file_operation(pid_file, "create PID file"),
        }
    }

    Err(AppError::DaemonAlreadyRunning {
        pid: running_pid(pid_file)?,
    })
}

fn staging_path(pid_file: &Path, pid: u32) -> PathBuf {
    let mut name = pid_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{pid}.{}", Uuid::new_v4().simple()));
    pid_file.with_file_name(name)
}

/// Remove the PID file if it still names this process
pub fn release(pid_file: &Path) {
    let ours = fs::read_to_string(pid_file)
        .ok()
        .and_then(|c| c.trim().parse::<u32>().ok())
        == Some(std::process::id());
    if ours {
        let _ = fs::remove_file(pid_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_missing_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(running_pid(&temp_dir.path().join("daemon.pid")).unwrap(), None);
    }

    #[test]
    fn test_malformed_pid_file_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        fs::write(&pid_file, "not a pid").unwrap();

        assert_eq!(running_pid(&pid_file).unwrap(), None);
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_claim_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");

        let pid = claim(&pid_file).unwrap();
        assert_eq!(pid, std::process::id());
        assert_eq!(running_pid(&pid_file).unwrap(), Some(pid));

        release(&pid_file);
        assert!(!pid_file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_claim_refuses_live_foreign_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        let parent = std::os::unix::process::parent_id();
        fs::write(&pid_file, parent.to_string()).unwrap();

        let err = claim(&pid_file).unwrap_err();
        assert!(matches!(err, AppError::DaemonAlreadyRunning { pid: Some(p) } if p == parent));
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), parent.to_string());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_claim_replaces_stale_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        // Above the kernel's pid_max ceiling, never a live process
        fs::write(&pid_file, "4194305").unwrap();

        let pid = claim(&pid_file).unwrap();
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), pid.to_string());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_claim_is_exclusive_across_threads() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pid_file = pid_file.clone();
                std::thread::spawn(move || claim(&pid_file))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), std::process::id());
        }
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), std::process::id().to_string());
    }

    #[test]
    fn test_release_keeps_foreign_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        fs::write(&pid_file, "1").unwrap();

        release(&pid_file);
        assert!(pid_file.exists());
    }
}
