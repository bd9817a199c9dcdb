//! The in-process aesd device
//!
//! Behaves like the aesd character device: writers append bytes until a
//! newline completes a record, readers walk the concatenated records through
//! a per-handle file position.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use aesd_core::{CircularLogBuffer, DEFAULT_CAPACITY, RecordFramer, Trailing};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::DeviceError;

/// Origin for [`DeviceHandle::llseek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

#[derive(Debug)]
struct DeviceState {
    buffer: CircularLogBuffer,
    /// Partial record shared by every writer of the device
    pending: RecordFramer,
}

/// The device: a ring of records plus one pending write, behind one lock
#[derive(Debug)]
pub struct AesdDevice {
    state: Mutex<DeviceState>,
}

impl AesdDevice {
    /// Device holding [`DEFAULT_CAPACITY`] records
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                buffer: CircularLogBuffer::with_capacity(capacity),
                pending: RecordFramer::new().trailing(Trailing::Include),
            }),
        }
    }

    /// Open a handle positioned at the start of the log
    pub fn open(self: &Arc<Self>) -> DeviceHandle {
        trace!("open");
        DeviceHandle {
            device: Arc::clone(self),
            position: 0,
        }
    }

    /// Bytes readable from the device
    pub fn total_size(&self) -> usize {
        self.state.lock().buffer.total_size()
    }

    /// Number of complete records held
    pub fn record_count(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Bytes written but not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.pending_len()
    }

    /// Drop the pending write and every stored record
    ///
    /// Returns how many records were released.
    pub fn release(&self) -> usize {
        let mut state = self.state.lock();
        state.pending.reset();
        let released = state.buffer.drain().count();
        debug!(released, "aesd device cleaned");
        released
    }
}

impl Default for AesdDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AesdDevice {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.pending.reset();
        let released = state.buffer.drain().count();
        trace!(released, "aesd device dropped");
    }
}

/// An open file on an [`AesdDevice`]
///
/// Each handle carries its own position. Writes ignore the position and
/// always extend the log.
#[derive(Debug)]
pub struct DeviceHandle {
    device: Arc<AesdDevice>,
    position: u64,
}

impl DeviceHandle {
    /// Current file position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The device this handle is open on
    pub fn device(&self) -> &Arc<AesdDevice> {
        &self.device
    }

    /// Reposition the handle
    ///
    /// Only [`Whence::Set`] is supported.
    pub fn llseek(&mut self, offset: i64, whence: Whence) -> Result<u64, DeviceError> {
        if whence != Whence::Set {
            debug!(?whence, "seek other than Set is unsupported");
            return Err(DeviceError::IllegalSeek);
        }
        // taken so a seek cannot land in the middle of a concurrent append
        let _state = self.device.state.lock();
        let position = u64::try_from(offset).map_err(|_| DeviceError::InvalidPosition(offset))?;
        self.position = position;
        trace!(position, "llseek");
        Ok(position)
    }
}

impl Read for DeviceHandle {
    /// Copy from the record containing the current position
    ///
    /// A single call never crosses a record boundary.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.device.state.lock();
        let Ok(offset) = usize::try_from(self.position) else {
            return Ok(0);
        };
        let Some((entry, inner)) = state.buffer.find_by_offset(offset) else {
            trace!(position = self.position, "no data to read");
            return Ok(0);
        };

        let n = (entry.size() - inner).min(buf.len());
        buf[..n].copy_from_slice(&entry.data()[inner..inner + n]);
        self.position += n as u64;
        trace!(n, position = self.position, "read");
        Ok(n)
    }
}

impl Write for DeviceHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.device.state.lock();
        if let Some(record) = state.pending.feed(buf) {
            debug!(size = record.size(), "record completed");
            if let Some(evicted) = state.buffer.append(record) {
                trace!(size = evicted.size(), "freeing oldest record");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for DeviceHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = match pos {
            SeekFrom::Start(p) => match i64::try_from(p) {
                Ok(p) => self.llseek(p, Whence::Set),
                Err(_) => Err(DeviceError::InvalidPosition(i64::MAX)),
            },
            SeekFrom::Current(o) => self.llseek(o, Whence::Current),
            SeekFrom::End(o) => self.llseek(o, Whence::End),
        };
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(capacity: usize) -> Arc<AesdDevice> {
        Arc::new(AesdDevice::with_capacity(capacity))
    }

    #[test]
    fn test_partial_writes_form_one_record() {
        let dev = device(10);
        let mut handle = dev.open();
        assert_eq!(handle.write(b"write1").unwrap(), 6);
        assert_eq!(dev.record_count(), 0);
        assert_eq!(dev.pending_len(), 6);

        handle.write_all(b" continued\n").unwrap();
        assert_eq!(dev.record_count(), 1);
        assert_eq!(dev.pending_len(), 0);
        assert_eq!(dev.total_size(), 17);
    }

    #[test]
    fn test_read_stops_at_record_boundary() {
        let dev = device(10);
        let mut handle = dev.open();
        handle.write_all(b"abc\n").unwrap();
        handle.write_all(b"de\n").unwrap();

        let mut reader = dev.open();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"abc\n");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"de\n");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_small_reads_advance_position() {
        let dev = device(10);
        dev.open().write_all(b"hello\n").unwrap();

        let mut reader = dev.open();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"o\n");
    }

    #[test]
    fn test_write_keeps_bytes_after_newline() {
        let dev = device(10);
        dev.open().write_all(b"one\ntwo").unwrap();

        let mut out = String::new();
        dev.open().read_to_string(&mut out).unwrap();
        assert_eq!(out, "one\ntwo");
    }

    #[test]
    fn test_seek_set_only() {
        let dev = device(10);
        dev.open().write_all(b"0123456789\n").unwrap();

        let mut handle = dev.open();
        assert_eq!(handle.seek(SeekFrom::Start(7)).unwrap(), 7);
        let mut out = Vec::new();
        handle.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"789\n");

        let err = handle.seek(SeekFrom::Current(0)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ESPIPE));
        let err = handle.seek(SeekFrom::End(0)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ESPIPE));
        assert_eq!(handle.llseek(-1, Whence::Set), Err(DeviceError::InvalidPosition(-1)));
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let dev = device(2);
        let mut handle = dev.open();
        for line in ["a\n", "b\n", "c\n"] {
            handle.write_all(line.as_bytes()).unwrap();
        }
        let mut out = String::new();
        dev.open().read_to_string(&mut out).unwrap();
        assert_eq!(out, "b\nc\n");
    }

    #[test]
    fn test_release_empties_device() {
        let dev = device(4);
        let mut handle = dev.open();
        handle.write_all(b"x\ny\n").unwrap();
        handle.write_all(b"z\n").unwrap();
        handle.write_all(b"partial").unwrap();

        assert_eq!(dev.release(), 2);
        assert_eq!(dev.total_size(), 0);
        assert_eq!(dev.pending_len(), 0);
    }

    #[test]
    fn test_empty_write_is_noop() {
        let dev = device(4);
        assert_eq!(dev.open().write(b"").unwrap(), 0);
        assert_eq!(dev.pending_len(), 0);
    }
}
