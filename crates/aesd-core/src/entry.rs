//! Log entries
//!
//! A [`LogEntry`] is one complete, delimiter-terminated record. Entries are
//! immutable once built; the buffer that stores them owns them until they are
//! evicted or drained.

use std::fmt;

use bytes::Bytes;

/// One complete record stored in the log
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LogEntry {
    data: Bytes,
}

impl LogEntry {
    /// Create an entry from owned bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Copy a slice into a new entry
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Record contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the record in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("size", &self.size())
            .field("data", &String::from_utf8_lossy(&self.data))
            .finish()
    }
}

impl From<&'static str> for LogEntry {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Vec<u8>> for LogEntry {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl AsRef<[u8]> for LogEntry {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
