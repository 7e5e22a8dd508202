//! File-backed cursor store.
//!
//! The cursor file is small, human-readable JSON:
//!
//! ```json
//! { "last_run_time": "2024-05-01T12:00:00Z" }
//! ```
//!
//! Writes go to a uniquely named temp file in the same directory, are fsynced,
//! then renamed over the cursor. A crash leaves either the old file or the new
//! one; a stray temp file is never read.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lock::CursorLock;
use super::{CursorGuard, CursorStore};
use crate::error::CursorError;
use crate::timestamp::parse_timestamp;

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_run_time: Option<String>,
}

/// Cursor persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    /// Creates a store for the cursor file at `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cursor file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, CursorError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CursorError::Io(e)),
        };

        let file: CursorFile =
            serde_json::from_str(&contents).map_err(|e| CursorError::Unreadable {
                message: format!("{}: {e}", self.path.display()),
            })?;

        match file.last_run_time {
            None => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| CursorError::Unreadable {
                    message: format!("{}: not an ISO-8601 timestamp: {raw:?}", self.path.display()),
                }),
        }
    }

    fn store(&self, at: DateTime<Utc>) -> Result<(), CursorError> {
        let file = CursorFile {
            last_run_time: Some(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        };
        let mut bytes = serde_json::to_vec_pretty(&file).map_err(|e| CursorError::Serialize {
            message: e.to_string(),
        })?;
        bytes.push(b'\n');

        let mut writer = CursorWriter::new(self.path.clone())?;
        writer.write_all(&bytes)?;
        writer.finalize()?;
        sync_dir(self.dir())?;

        tracing::debug!(path = %self.path.display(), last_run_time = %at, "cursor persisted");
        Ok(())
    }

    fn lock(&self) -> Result<CursorGuard, CursorError> {
        CursorLock::acquire(&self.path).map(CursorGuard::holding)
    }
}

/// Writes the new cursor to a temp file and renames it into place on finalize.
struct CursorWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl CursorWriter {
    fn new(final_path: PathBuf) -> std::io::Result<Self> {
        let mut temp_name = final_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        temp_name.push(format!(".tmp.{}", Uuid::new_v4()));
        let temp_path = final_path.with_file_name(temp_name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        Ok(Self {
            temp_path: Some(temp_path),
            final_path,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(ErrorKind::Other, "writer already consumed")
        })?;
        writer.write_all(bytes)
    }

    /// Flush, fsync, rename. After this returns the new cursor is durable
    /// (modulo the directory sync done by the caller).
    fn finalize(mut self) -> std::io::Result<()> {
        let mut writer = self.writer.take().ok_or_else(|| {
            std::io::Error::new(ErrorKind::Other, "writer already consumed")
        })?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        let temp_path = self.temp_path.take().ok_or_else(|| {
            std::io::Error::new(ErrorKind::Other, "temp_path already consumed")
        })?;
        if let Err(e) = fs::rename(&temp_path, &self.final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for CursorWriter {
    fn drop(&mut self) {
        // Best-effort cleanup of temp file if not finalized
        self.writer.take();
        if let Some(ref temp_path) = self.temp_path {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
            }
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
