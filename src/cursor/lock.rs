//! Single-writer lock for a cursor file.
//!
//! The lock is taken on a sibling `<cursor>.lock` file rather than on the
//! cursor itself, because every cursor write replaces the cursor file by
//! rename. The OS drops the lock when the handle closes, including when the
//! owning process dies.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CursorError;

/// Exclusive ownership of one cursor, released on drop.
#[derive(Debug)]
pub struct CursorLock {
    _file: File,
    path: PathBuf,
}

impl CursorLock {
    /// Path of the lock file guarding `cursor`.
    #[must_use]
    pub fn path_for(cursor: &Path) -> PathBuf {
        let mut name = cursor
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| OsString::from("cursor"));
        name.push(".lock");
        cursor.with_file_name(name)
    }

    /// Takes the lock for `cursor` without blocking.
    ///
    /// # Errors
    /// - `CursorError::Locked` if another run holds it
    /// - `CursorError::Io` if the lock file cannot be opened
    pub fn acquire(cursor: &Path) -> Result<Self, CursorError> {
        let path = Self::path_for(cursor);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !try_exclusive(&file)? {
            return Err(CursorError::Locked { path });
        }
        tracing::debug!(lock = %path.display(), "cursor lock taken");
        Ok(Self { _file: file, path })
    }

    /// The lock file this guard holds.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `Ok(false)` means someone else holds the lock.
#[cfg(unix)]
fn try_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file`, which outlives the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_exclusive(file: &File) -> io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle is owned by `file`; a zeroed OVERLAPPED is a valid
    // request for offset 0.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    #[allow(clippy::cast_possible_wrap)]
    let violation = ERROR_LOCK_VIOLATION as i32;
    if err.raw_os_error() == Some(violation) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_exclusive(_file: &File) -> io::Result<bool> {
    tracing::warn!("file locking not supported on this platform; running without a cursor lock");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_file_sits_next_to_cursor() {
        assert_eq!(
            CursorLock::path_for(Path::new("state/dedupe_log.json")),
            PathBuf::from("state/dedupe_log.json.lock")
        );
        assert_eq!(
            CursorLock::path_for(Path::new("dedupe_log.json")),
            PathBuf::from("dedupe_log.json.lock")
        );
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().unwrap();
        let cursor = dir.path().join("dedupe_log.json");

        {
            let lock = CursorLock::acquire(&cursor).unwrap();
            assert!(lock.path().exists());
            assert!(!cursor.exists());
        }
        let _again = CursorLock::acquire(&cursor).unwrap();
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_held_lock_is_reported_as_locked() {
        let dir = tempdir().unwrap();
        let cursor = dir.path().join("dedupe_log.json");

        let _held = CursorLock::acquire(&cursor).unwrap();
        match CursorLock::acquire(&cursor) {
            Err(CursorError::Locked { path }) => assert_eq!(path, CursorLock::path_for(&cursor)),
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let cursor = dir.path().join("missing").join("dedupe_log.json");
        assert!(matches!(CursorLock::acquire(&cursor), Err(CursorError::Io(_))));
    }
}
