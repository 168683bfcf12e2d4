//! Per-source upload lock
//!
//! Advisory exclusive lock on `<source>.session.lock` using fd-lock, held for
//! the whole upload run so two processes never drive the same session.

use super::SessionError;
use fd_lock::RwLock;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held exclusive lock on a source file's session
///
/// The lock is released when the value is dropped and the file closes.
pub struct UploadLock {
    path: PathBuf,
    #[allow(dead_code)]
    lock: RwLock<File>,
}

impl UploadLock {
    /// Lock path for a session side-car path
    pub fn lock_path(session_path: &Path) -> PathBuf {
        let mut os = session_path.as_os_str().to_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Try to take the lock without blocking
    ///
    /// Fails immediately if another process holds it.
    pub fn try_acquire(session_path: &Path) -> Result<Self, SessionError> {
        let path = Self::lock_path(session_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SessionError::Lock(format!("Failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);
        {
            let guard = lock.try_write().map_err(|e| {
                SessionError::Lock(format!(
                    "{} is locked by another upload: {e}",
                    path.display()
                ))
            })?;
            // The OS lock lives as long as the descriptor owned by `lock`.
            std::mem::forget(guard);
        }

        debug!(path = %path.display(), "Acquired upload lock");
        Ok(Self { path, lock })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for UploadLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
