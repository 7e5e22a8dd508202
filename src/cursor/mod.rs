//! Incremental ingestion cursor.
//!
//! The cursor is the high-water mark of the last successful run. It is read
//! once at the start of a run and written once at the end; a run that never
//! reaches the write leaves the previous value in place, so every record is
//! delivered at least once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Cursor<S>                     │
//! │   read(): degrade corrupt → None (warn)       │
//! │   write(): surface every failure              │
//! ├──────────────────────────────────────────────┤
//! │              S: CursorStore                   │
//! │  ┌────────────────┐   ┌────────────────────┐  │
//! │  │FileCursorStore │   │ MemoryCursorStore  │  │
//! │  │ tmp + rename   │   │ (tests, embedding) │  │
//! │  │ + .lock file   │   │                    │  │
//! │  └────────────────┘   └────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

mod file;
mod lock;
mod memory;

pub use file::FileCursorStore;
pub use lock::CursorLock;
pub use memory::MemoryCursorStore;

use chrono::{DateTime, Utc};

use crate::error::CursorError;

/// Durable storage for the cursor timestamp.
///
/// Implementations must make `store` atomic: after a crash, `load` returns
/// either the previous or the new value, never a partial one.
pub trait CursorStore: Send + Sync {
    /// Load the persisted timestamp. `Ok(None)` means no cursor exists yet.
    ///
    /// # Errors
    /// - `Unreadable`: the stored value exists but cannot be interpreted
    /// - `Io`: the backing storage could not be read
    fn load(&self) -> Result<Option<DateTime<Utc>>, CursorError>;

    /// Persist a new timestamp, replacing the old one.
    ///
    /// # Errors
    /// Any failure to make the new value durable.
    fn store(&self, at: DateTime<Utc>) -> Result<(), CursorError>;

    /// Take the single-writer lock for the duration of a run.
    ///
    /// The default is a no-op guard for stores that are not shared between
    /// processes.
    ///
    /// # Errors
    /// - `Locked`: another run holds the lock
    fn lock(&self) -> Result<CursorGuard, CursorError> {
        Ok(CursorGuard::unlocked())
    }
}

/// Held for the duration of a run; releases the store lock on drop.
#[derive(Debug)]
pub struct CursorGuard {
    _lock: Option<CursorLock>,
}

impl CursorGuard {
    /// A guard that holds nothing.
    #[must_use]
    pub const fn unlocked() -> Self {
        Self { _lock: None }
    }

    pub(crate) const fn holding(lock: CursorLock) -> Self {
        Self { _lock: Some(lock) }
    }
}

/// The ingestion cursor over an injected store.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use practice_dedupe::{Cursor, MemoryCursorStore};
///
/// let cursor = Cursor::new(MemoryCursorStore::new());
/// assert!(cursor.read().is_none());
///
/// let now = Utc::now();
/// cursor.write(now).unwrap();
/// assert_eq!(cursor.read(), Some(now));
/// ```
#[derive(Debug)]
pub struct Cursor<S> {
    store: S,
}

impl<S: CursorStore> Cursor<S> {
    /// Wraps a store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the last persisted run time.
    ///
    /// `None` on a first run, and also when the stored cursor cannot be read:
    /// reprocessing records is preferred over skipping them.
    pub fn read(&self) -> Option<DateTime<Utc>> {
        match self.store.load() {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "cursor unreadable, falling back to full backfill");
                None
            }
        }
    }

    /// Persists `at` as the new cursor.
    ///
    /// # Errors
    ///
    /// Propagates the store failure. Callers must report it: a cursor that
    /// silently fails to advance causes the same window to be reprocessed on
    /// every run.
    pub fn write(&self, at: DateTime<Utc>) -> Result<(), CursorError> {
        self.store.store(at)
    }

    /// Takes the store's single-writer lock.
    ///
    /// # Errors
    /// - `Locked`: another run holds the lock
    pub fn lock(&self) -> Result<CursorGuard, CursorError> {
        self.store.lock()
    }

    /// Returns the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}
