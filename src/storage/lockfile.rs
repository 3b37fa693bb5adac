//! Registry Lock File
//!
//! Prevents two calibration processes from writing the same registry at
//! once, which would interleave version directories and the `latest` pointer.

use super::StorageError;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// PID lock held for the duration of a registry write.
///
/// Released (lock file removed) on drop.
#[derive(Debug)]
pub struct RegistryLock {
    lock_path: PathBuf,
    owned: bool,
}

impl RegistryLock {
    /// Lock file name
    pub const LOCK_FILE_NAME: &'static str = ".registry.lock";

    /// Acquire the lock for a registry root.
    ///
    /// Fails with [`StorageError::Locked`] while another live process holds it.
    /// A lock left behind by a dead process is removed.
    pub fn acquire<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(StorageError::io(root))?;

        let lock_path = root.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::holder_pid(&lock_path) {
                Some(pid) if Self::is_process_running(pid) => {
                    return Err(StorageError::Locked {
                        path: root.to_path_buf(),
                        pid,
                    });
                }
                _ => {
                    tracing::info!(path = %lock_path.display(), "Removing stale registry lock");
                    if let Err(e) = fs::remove_file(&lock_path) {
                        if e.kind() != ErrorKind::NotFound {
                            return Err(StorageError::Io(lock_path, e));
                        }
                    }
                }
            }
        }

        // create_new closes the race between the check above and our write
        let pid = std::process::id();
        let mut file: File = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::Locked {
                    path: root.to_path_buf(),
                    pid: Self::holder_pid(&lock_path).unwrap_or(0),
                },
                _ => StorageError::Io(lock_path.clone(), e),
            })?;
        writeln!(file, "{pid}").map_err(StorageError::io(&lock_path))?;

        tracing::debug!(pid, path = %lock_path.display(), "Acquired registry lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID recorded in an existing lock file, if readable.
    fn holder_pid(lock_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path).ok()?.trim().parse().ok()
    }

    /// Check if a process with the given PID is still running
    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        pid == std::process::id() || Path::new(&format!("/proc/{pid}")).exists()
    }

    #[cfg(not(unix))]
    fn is_process_running(_pid: u32) -> bool {
        // Without /proc, assume the holder is alive
        true
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove registry lock file");
            } else {
                tracing::debug!(path = %self.lock_path.display(), "Released registry lock");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        self.release();
    }
}
