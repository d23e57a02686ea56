//! Writer lock serialising mutating invocations
//!
//! `add` and `remove` hold an exclusive `flock` on the lock file for the
//! whole read-allocate-write-apply sequence. The lock is tied to the open
//! file description, so it is released when the holder exits, even on a
//! crash. The file is never unlinked: removing it while another process
//! waits on the old inode would let a third process lock a fresh one.

use crate::error::{ManagerError, ManagerResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Held exclusive lock; released on drop
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

impl WriterLock {
    /// Block until the exclusive lock on `path` is held
    pub fn acquire(path: impl AsRef<Path>) -> ManagerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_error = |e: io::Error| ManagerError::Lock {
            path: path.display().to_string(),
            detail: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true);
        #[cfg(unix)]
        opts.custom_flags(libc::O_CLOEXEC).mode(0o600);

        let mut file = opts.open(&path).map_err(lock_error)?;
        flock_exclusive(&file).map_err(lock_error)?;

        // PID of the holder, for debugging only
        if let Err(e) = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()))
        {
            tracing::debug!(path = %path.display(), "Failed to record lock holder: {}", e);
        }

        tracing::debug!(path = %path.display(), "Acquired writer lock");
        Ok(Self { path, file })
    }
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    loop {
        let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "advisory file locks require a unix platform",
    ))
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        // closing the descriptor releases the flock
        tracing::debug!(path = %self.path.display(), "Released writer lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_file_with_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("wg-manager.lock");

        let lock = WriterLock::acquire(&path).unwrap();
        assert_eq!(lock.path, path);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(lock);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_second_holder_waits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg-manager.lock");

        let first = WriterLock::acquire(&path).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));

        let waiter = {
            let path = path.clone();
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _lock = WriterLock::acquire(&path).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(first);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
