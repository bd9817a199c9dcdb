//! The backing-store abstraction

use std::fmt;

use aesd_core::LogEntry;

use crate::error::StorageResult;

/// Which kind of object backs the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process circular buffer
    Ring,
    /// Regular file, created fresh at startup and removed at shutdown
    File,
    /// Device node whose content is defined purely by client writes
    Device,
}

impl BackendKind {
    /// Whether the service may append records of its own (timestamps)
    pub fn accepts_generated_records(self) -> bool {
        !matches!(self, BackendKind::Device)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Ring => "ring",
            BackendKind::File => "file",
            BackendKind::Device => "device",
        };
        f.write_str(name)
    }
}

/// Storage for a log of complete records
///
/// Implementations do no locking; [`SharedLog`](crate::SharedLog) serializes
/// every call. Each method covers exactly one whole record or one whole read.
pub trait LogStore: Send {
    /// The kind of object behind this store
    fn kind(&self) -> BackendKind;

    /// Append one complete record at the end of the log
    fn append(&mut self, record: LogEntry) -> StorageResult<()>;

    /// Copy the entire log, oldest record first
    fn snapshot(&mut self) -> StorageResult<Vec<u8>>;

    /// Copy up to `max` bytes starting at a logical offset
    ///
    /// Offsets at or past the end yield an empty vector.
    fn read_at(&mut self, offset: u64, max: usize) -> StorageResult<Vec<u8>>;

    /// Current size of the log content in bytes
    fn total_size(&mut self) -> StorageResult<u64>;

    /// Release the store and everything it still holds
    fn close(self: Box<Self>) -> StorageResult<()>;
}
