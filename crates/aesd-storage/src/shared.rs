//! The shared log resource
//!
//! One exclusive lock guards the backing store. Every append, offset lookup
//! and full read-back happens while holding it, and the guard is dropped on
//! every exit path, error paths included. Records are framed before the lock
//! is taken, so the unit of work under the lock is always one whole record or
//! one whole read.

use std::fmt;

use aesd_core::LogEntry;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::StorageResult;
use crate::store::{BackendKind, LogStore};

/// A [`LogStore`] behind a single mutex
pub struct SharedLog {
    store: Mutex<Box<dyn LogStore>>,
    kind: BackendKind,
}

impl SharedLog {
    pub fn new<S: LogStore + 'static>(store: S) -> Self {
        Self::from_boxed(Box::new(store))
    }

    pub fn from_boxed(store: Box<dyn LogStore>) -> Self {
        let kind = store.kind();
        Self {
            store: Mutex::new(store),
            kind,
        }
    }

    /// Kind of the backing object
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Append one complete record
    pub fn append(&self, record: LogEntry) -> StorageResult<()> {
        let size = record.size();
        self.store.lock().append(record)?;
        trace!(size, "Appended record");
        Ok(())
    }

    /// Copy the whole log, oldest first
    pub fn snapshot(&self) -> StorageResult<Vec<u8>> {
        self.store.lock().snapshot()
    }

    /// Copy up to `max` bytes from a logical offset
    pub fn read_at(&self, offset: u64, max: usize) -> StorageResult<Vec<u8>> {
        self.store.lock().read_at(offset, max)
    }

    pub fn total_size(&self) -> StorageResult<u64> {
        self.store.lock().total_size()
    }

    /// Release the backing store
    ///
    /// Consumes the log, so nothing can reach the store afterwards.
    pub fn close(self) -> StorageResult<()> {
        debug!(kind = %self.kind, "Releasing shared log");
        self.store.into_inner().close()
    }
}

impl fmt::Debug for SharedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLog").field("kind", &self.kind).finish_non_exhaustive()
    }
}
