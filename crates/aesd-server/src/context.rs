//! State shared by the supervisor, every worker and the periodic producer

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use aesd_storage::{SharedLog, StorageError};
use parking_lot::Mutex;
use tracing::error;

use crate::config::ServerConfig;
use crate::shutdown::ShutdownHandle;

/// Connection counters, cheap to clone and read from any thread
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    active: Arc<AtomicUsize>,
    accepted: Arc<AtomicU64>,
}

impl ConnectionStats {
    /// Workers that have not yet reported completion
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Connections accepted since startup
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Explicitly constructed process context
///
/// Owns the shared log and carries the shutdown handle. Handed to each
/// thread behind an `Arc`.
#[derive(Debug)]
pub struct ServerContext {
    log: SharedLog,
    read_chunk_size: usize,
    delimiter: u8,
    shutdown: ShutdownHandle,
    fatal: Mutex<Option<StorageError>>,
    stats: ConnectionStats,
}

impl ServerContext {
    pub fn new(config: &ServerConfig, log: SharedLog, shutdown: ShutdownHandle) -> Self {
        Self {
            log,
            read_chunk_size: config.read_chunk_size,
            delimiter: config.delimiter,
            shutdown,
            fatal: Mutex::new(None),
            stats: ConnectionStats::default(),
        }
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn shutdown(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Record a storage failure and stop the service
    ///
    /// Only the first failure is kept; later ones are logged and dropped.
    pub fn record_fatal(&self, err: StorageError) {
        error!(error = %err, "Shared log failed; shutting down");
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.shutdown.trigger();
    }

    /// Remove and return the recorded failure, if any
    pub fn take_fatal(&self) -> Option<StorageError> {
        self.fatal.lock().take()
    }

    pub(crate) fn into_log(self) -> SharedLog {
        self.log
    }
}
