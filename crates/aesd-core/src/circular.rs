//! Fixed-capacity circular log buffer
//!
//! Stores the most recent `N` records in an arena of `N` slots addressed by
//! two cursors. A separate `full` flag tells "cursors equal because empty"
//! apart from "cursors equal because full".
//!
//! ```text
//!   not full:  [ e0 | e1 | e2 | -- | -- ]     valid = [0, write_index)
//!                               ^write
//!   full:      [ e5 | e6 | e2 | e3 | e4 ]     valid = N slots from read_index
//!                         ^write == read
//! ```
//!
//! The buffer does no locking of its own; callers serialize access.

use std::iter::FusedIterator;

use crate::entry::LogEntry;

/// Number of records retained when no capacity is given
pub const DEFAULT_CAPACITY: usize = 10;

/// Ring of at most `capacity` records with oldest-first eviction
#[derive(Debug, Clone)]
pub struct CircularLogBuffer {
    entries: Box<[Option<LogEntry>]>,
    write_index: usize,
    read_index: usize,
    full: bool,
    total_size: usize,
}

impl CircularLogBuffer {
    /// Create an empty buffer with [`DEFAULT_CAPACITY`] slots
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty buffer with `capacity` slots
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "circular log buffer needs at least one slot");
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            write_index: 0,
            read_index: 0,
            full: false,
            total_size: 0,
        }
    }

    /// Reset to the empty state, releasing every stored entry
    pub fn init(&mut self) {
        self.entries.iter_mut().for_each(|slot| *slot = None);
        self.write_index = 0;
        self.read_index = 0;
        self.full = false;
        self.total_size = 0;
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of valid entries
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            (self.write_index + self.capacity() - self.read_index) % self.capacity()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once every slot has been written at least once
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Sum of the sizes of all valid entries
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Slot the next append will fill
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Slot holding the oldest valid entry
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Store `entry` in the next slot
    ///
    /// When the ring is already full the oldest entry is overwritten and
    /// handed back to the caller, who becomes responsible for it.
    pub fn append(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let added = entry.size();
        let evicted = self.entries[self.write_index].replace(entry);
        if let Some(old) = &evicted {
            self.total_size -= old.size();
        }
        self.total_size += added;

        self.write_index = self.advance(self.write_index);
        if self.full {
            self.read_index = self.advance(self.read_index);
        } else if self.write_index == self.read_index {
            self.full = true;
        }

        evicted
    }

    /// Locate a logical byte offset
    ///
    /// The offset addresses the concatenation of all valid entries, oldest
    /// first. Returns the entry containing that byte and the offset inside
    /// it, or `None` when the offset is at or beyond [`total_size`].
    ///
    /// [`total_size`]: Self::total_size
    pub fn find_by_offset(&self, logical_offset: usize) -> Option<(&LogEntry, usize)> {
        let mut remaining = logical_offset;
        for entry in self.iter() {
            if remaining < entry.size() {
                return Some((entry, remaining));
            }
            remaining -= entry.size();
        }
        None
    }

    /// Iterate valid entries from oldest to newest
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buffer: self,
            position: 0,
            remaining: self.len(),
        }
    }

    /// Concatenate every valid entry, oldest first
    pub fn contents(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size);
        for entry in self.iter() {
            out.extend_from_slice(entry.data());
        }
        out
    }

    /// Evict every entry, oldest first, handing each one back
    ///
    /// Entries not consumed from the iterator are released when it is
    /// dropped. The buffer is empty afterwards either way.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { buffer: self }
    }

    fn pop_oldest(&mut self) -> Option<LogEntry> {
        if self.is_empty() {
            return None;
        }
        let entry = self.entries[self.read_index].take();
        self.read_index = self.advance(self.read_index);
        self.full = false;
        if let Some(e) = &entry {
            self.total_size -= e.size();
        }
        entry
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }
}

impl Default for CircularLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a CircularLogBuffer {
    type Item = &'a LogEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Oldest-to-newest iterator over a [`CircularLogBuffer`]
pub struct Iter<'a> {
    buffer: &'a CircularLogBuffer,
    position: usize,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let slot = (self.buffer.read_index + self.position) % self.buffer.capacity();
            self.position += 1;
            self.remaining -= 1;
            if let Some(entry) = self.buffer.entries[slot].as_ref() {
                return Some(entry);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl FusedIterator for Iter<'_> {}

/// Draining iterator returned by [`CircularLogBuffer::drain`]
pub struct Drain<'a> {
    buffer: &'a mut CircularLogBuffer,
}

impl Iterator for Drain<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        self.buffer.pop_oldest()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.buffer.len();
        (len, Some(len))
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        while self.buffer.pop_oldest().is_some() {}
        self.buffer.write_index = 0;
        self.buffer.read_index = 0;
    }
}
