//! Error types for aesd-device

use std::io;

use thiserror::Error;

/// Errors returned by device file operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Only absolute positioning is supported
    #[error("Illegal seek: only absolute positioning is supported")]
    IllegalSeek,

    /// Requested file position is negative
    #[error("Invalid file position: {0}")]
    InvalidPosition(i64),
}

impl DeviceError {
    /// errno a device driver would report for this error
    pub fn errno(self) -> i32 {
        match self {
            DeviceError::IllegalSeek => libc::ESPIPE,
            DeviceError::InvalidPosition(_) => libc::EINVAL,
        }
    }
}

impl From<DeviceError> for io::Error {
    fn from(err: DeviceError) -> Self {
        io::Error::from_raw_os_error(err.errno())
    }
}
