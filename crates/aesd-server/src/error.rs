//! Error types for the socket server

use std::io;
use std::net::SocketAddr;

use aesd_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the whole service
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// `accept` failed for a reason other than shutdown
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The shared log failed; its content can no longer be trusted
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A service thread could not be started
    #[error("Failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Errors confined to a single connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Reading from the peer failed
    #[error("Read from peer failed: {0}")]
    Read(#[source] io::Error),

    /// Writing the response to the peer failed
    #[error("Write to peer failed: {0}")]
    Write(#[source] io::Error),

    /// The shared log failed while serving this connection
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for server operations
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_converts() {
        let err: ServerError = StorageError::Io(io::Error::other("boom")).into();
        assert!(matches!(err, ServerError::Storage(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:9000".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:9000"));
    }
}
