//! Advisory locking on pod directories.
//!
//! The supervisor holds an exclusive `flock` on the pod directory for as long
//! as the pod runs, and preparation runs under the same exclusive lock. Status
//! queries only probe the lock with a non-blocking shared request and release
//! it immediately, so they never wait on a live pod.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{PodliteError, PodliteResult};

/// Exclusive lock on a pod directory, released on drop.
#[derive(Debug)]
pub struct PodLock {
    file: File,
    path: PathBuf,
}

impl PodLock {
    /// Try to take the exclusive lock without blocking.
    ///
    /// # Returns
    /// * `Ok(Some(lock))` - lock acquired
    /// * `Ok(None)` - another holder has it
    /// * `Err(...)` - the directory could not be opened or locked
    pub fn try_exclusive(pod_dir: &Path) -> PodliteResult<Option<Self>> {
        let file = File::open(pod_dir).map_err(|e| PodliteError::io("open pod dir", pod_dir, e))?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(PodliteError::io("lock pod dir", pod_dir, err));
        }

        tracing::debug!(pod_dir = %pod_dir.display(), "Acquired pod lock");

        Ok(Some(PodLock {
            file,
            path: pod_dir.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PodLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }

        tracing::debug!(pod_dir = %self.path.display(), "Released pod lock");
    }
}

/// Whether some process currently holds an exclusive lock on `pod_dir`.
///
/// Takes and drops a shared lock; never blocks.
pub fn is_locked(pod_dir: &Path) -> PodliteResult<bool> {
    let file = File::open(pod_dir).map_err(|e| PodliteError::io("open pod dir", pod_dir, e))?;
    let fd = file.as_raw_fd();

    let result = unsafe { libc::flock(fd, libc::LOCK_SH | libc::LOCK_NB) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            return Ok(true);
        }
        return Err(PodliteError::io("probe pod lock", pod_dir, err));
    }

    unsafe {
        libc::flock(fd, libc::LOCK_UN);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_lock_blocks_second_holder() {
        let temp_dir = TempDir::new().unwrap();

        let lock = PodLock::try_exclusive(temp_dir.path()).unwrap();
        assert!(lock.is_some());

        // flock is per open file description, so a second open conflicts
        let second = PodLock::try_exclusive(temp_dir.path()).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_probe_reports_held_lock() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_locked(temp_dir.path()).unwrap());

        let lock = PodLock::try_exclusive(temp_dir.path()).unwrap().unwrap();
        assert!(is_locked(temp_dir.path()).unwrap());
        assert_eq!(lock.path(), temp_dir.path());

        drop(lock);
        assert!(!is_locked(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_probe_missing_dir_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");
        assert!(is_locked(&missing).is_err());
    }
}
