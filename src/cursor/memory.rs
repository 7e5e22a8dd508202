//! In-memory cursor store.
//!
//! Thread-safe and process-local. Used by tests and by embedders that keep the
//! cursor in their own storage.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::CursorStore;
use crate::error::CursorError;

#[derive(Debug, Default)]
struct State {
    last_run_time: Option<DateTime<Utc>>,
    corrupt: bool,
    fail_writes: bool,
    writes: usize,
}

/// Cursor store backed by a lock-protected value.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    state: RwLock<State>,
}

fn poisoned() -> CursorError {
    CursorError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "poisoned lock: cursor state",
    ))
}

impl MemoryCursorStore {
    /// Creates an empty store (first run).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `at`.
    #[must_use]
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.write() {
            state.last_run_time = Some(at);
        }
        store
    }

    /// Marks the stored value as unreadable until the next successful write.
    pub fn corrupt(&self) {
        if let Ok(mut state) = self.state.write() {
            state.corrupt = true;
        }
    }

    /// Makes every subsequent write fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_writes = fail;
        }
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.writes)
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, CursorError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        if state.corrupt {
            return Err(CursorError::Unreadable {
                message: "stored cursor is corrupt".to_string(),
            });
        }
        Ok(state.last_run_time)
    }

    fn store(&self, at: DateTime<Utc>) -> Result<(), CursorError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.fail_writes {
            return Err(CursorError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        state.last_run_time = Some(at);
        state.corrupt = false;
        state.writes += 1;
        Ok(())
    }
}
