//! In-process ring store

use aesd_core::{CircularLogBuffer, LogEntry};
use tracing::debug;

use crate::error::StorageResult;
use crate::store::{BackendKind, LogStore};

/// Log kept in a [`CircularLogBuffer`]
///
/// Only the newest `capacity` records survive; older ones are released as
/// they are evicted.
#[derive(Debug, Default)]
pub struct RingStore {
    buffer: CircularLogBuffer,
}

impl RingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: CircularLogBuffer::with_capacity(capacity),
        }
    }

    /// Drain every stored record, returning how many were released
    fn release(&mut self) -> usize {
        self.buffer.drain().count()
    }
}

impl LogStore for RingStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Ring
    }

    fn append(&mut self, record: LogEntry) -> StorageResult<()> {
        if let Some(evicted) = self.buffer.append(record) {
            debug!(size = evicted.size(), "Evicted oldest record");
        }
        Ok(())
    }

    fn snapshot(&mut self) -> StorageResult<Vec<u8>> {
        Ok(self.buffer.contents())
    }

    fn read_at(&mut self, offset: u64, max: usize) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        let Ok(mut position) = usize::try_from(offset) else {
            return Ok(out);
        };

        while out.len() < max {
            let Some((entry, inner)) = self.buffer.find_by_offset(position) else {
                break;
            };
            let n = (entry.size() - inner).min(max - out.len());
            out.extend_from_slice(&entry.data()[inner..inner + n]);
            position += n;
        }
        Ok(out)
    }

    fn total_size(&mut self) -> StorageResult<u64> {
        Ok(self.buffer.total_size() as u64)
    }

    fn close(mut self: Box<Self>) -> StorageResult<()> {
        let released = self.release();
        debug!(released, "Released ring records");
        Ok(())
    }
}
