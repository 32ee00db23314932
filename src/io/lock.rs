//! Cross-process exclusion for write commands.
//!
//! Every writer locks `<data-dir>/.lock` with `flock(LOCK_EX)`. The file is
//! created on first use and stays in place after release: all holders must
//! contend on the same inode.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("could not acquire lock on {path}: another dl process may be writing")]
    Timeout { path: PathBuf },
    #[error("could not lock {path}: {source}")]
    Flock { path: PathBuf, source: io::Error },
}

/// Exclusive lock on a data directory, released when dropped.
pub struct FileLock {
    _file: File,
}

impl FileLock {
    /// Wait up to `timeout` for the data directory lock.
    pub fn acquire(data_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            let locked = try_lock_exclusive(&file).map_err(|source| LockError::Flock {
                path: path.clone(),
                source,
            })?;
            if locked {
                return Ok(FileLock { _file: file });
            }
            if Instant::now() >= deadline {
                log::warn!("event=lock_timeout path={}", path.display());
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn acquire_default(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, DEFAULT_TIMEOUT)
    }
}

/// `Ok(false)` when someone else holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(false),
        _ => Err(err),
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}
