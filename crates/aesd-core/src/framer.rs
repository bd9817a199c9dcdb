//! Record framing
//!
//! Accumulates raw bytes from one writer until the delimiter shows up, then
//! hands out the accumulated prefix as a single [`LogEntry`]. Nothing is ever
//! emitted without a delimiter, including at end of stream.

use bytes::BytesMut;

use crate::entry::LogEntry;

/// Record delimiter used by both front ends
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// What happens to bytes that follow the delimiter in the same chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trailing {
    /// Drop them; the record ends at the delimiter (network protocol)
    #[default]
    Discard,
    /// Keep them inside the completed record (device write semantics)
    Include,
}

/// Per-writer accumulator that turns a byte stream into records
#[derive(Debug, Clone)]
pub struct RecordFramer {
    delimiter: u8,
    trailing: Trailing,
    pending: BytesMut,
}

impl RecordFramer {
    /// Framer splitting on [`DEFAULT_DELIMITER`] and discarding trailing bytes
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            trailing: Trailing::default(),
            pending: BytesMut::new(),
        }
    }

    /// Set the policy for bytes after the delimiter
    pub fn trailing(mut self, trailing: Trailing) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Feed a chunk, returning a record once a delimiter has been seen
    ///
    /// After a record is returned the accumulator starts over empty.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<LogEntry> {
        // pending never holds a delimiter, so only the new chunk is scanned
        let Some(pos) = chunk.iter().position(|b| *b == self.delimiter) else {
            self.pending.extend_from_slice(chunk);
            return None;
        };

        match self.trailing {
            Trailing::Discard => self.pending.extend_from_slice(&chunk[..=pos]),
            Trailing::Include => self.pending.extend_from_slice(chunk),
        }
        Some(LogEntry::new(self.pending.split().freeze()))
    }

    /// Bytes held while waiting for a delimiter
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Throw away any partial record
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for RecordFramer {
    fn default() -> Self {
        Self::new()
    }
}
