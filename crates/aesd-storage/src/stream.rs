//! Byte-stream backed store (regular file or device node)
//!
//! The stream must place every write at its current end, the way a file
//! opened for appending or the aesd device does. Snapshots seek back to the
//! start and read until end of file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use aesd_core::LogEntry;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{BackendKind, LogStore};

/// Log kept in any readable, appendable, seekable byte stream
#[derive(Debug)]
pub struct StreamStore<S> {
    stream: S,
    kind: BackendKind,
    remove_on_close: Option<PathBuf>,
}

impl StreamStore<File> {
    /// Create (or truncate) a regular file that is removed again on close
    pub fn create_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        File::create(path).map_err(|e| StorageError::open(path, e))?;
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| StorageError::open(path, e))?;

        info!(path = %path.display(), "Created log file");
        Ok(Self {
            stream: file,
            kind: BackendKind::File,
            remove_on_close: Some(path.to_path_buf()),
        })
    }

    /// Open an existing device node; it is never truncated or removed
    pub fn open_device(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StorageError::open(path, e))?;

        info!(path = %path.display(), "Opened log device");
        Ok(Self {
            stream: file,
            kind: BackendKind::Device,
            remove_on_close: None,
        })
    }
}

impl<S: Read + Write + Seek> StreamStore<S> {
    /// Wrap an already open stream
    pub fn from_stream(stream: S, kind: BackendKind) -> Self {
        Self {
            stream,
            kind,
            remove_on_close: None,
        }
    }

    fn rewind_to(&mut self, offset: u64) -> io::Result<()> {
        self.stream.seek(SeekFrom::Start(offset)).map(|_| ())
    }
}

impl<S: Read + Write + Seek + Send> LogStore for StreamStore<S> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn append(&mut self, record: LogEntry) -> StorageResult<()> {
        self.stream.write_all(record.data())?;
        self.stream.flush()?;
        Ok(())
    }

    fn snapshot(&mut self) -> StorageResult<Vec<u8>> {
        self.rewind_to(0)?;
        let mut content = Vec::new();
        self.stream.read_to_end(&mut content)?;
        Ok(content)
    }

    fn read_at(&mut self, offset: u64, max: usize) -> StorageResult<Vec<u8>> {
        self.rewind_to(offset)?;
        let mut content = Vec::with_capacity(max.min(64 * 1024));
        (&mut self.stream).take(max as u64).read_to_end(&mut content)?;
        Ok(content)
    }

    fn total_size(&mut self) -> StorageResult<u64> {
        // SEEK_END is not available on the device, so count instead
        self.rewind_to(0)?;
        Ok(io::copy(&mut self.stream, &mut io::sink())?)
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        let StreamStore {
            stream,
            kind,
            remove_on_close,
        } = *self;
        drop(stream);

        if let Some(path) = remove_on_close {
            std::fs::remove_file(&path).map_err(|source| StorageError::Cleanup {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "Removed log file");
        } else {
            debug!(%kind, "Closed log stream");
        }
        Ok(())
    }
}
