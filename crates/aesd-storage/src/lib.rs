//! # aesd storage
//!
//! Backing stores for the aesd record log and the lock that serializes access
//! to them.
//!
//! ## Features
//!
//! - **LogStore trait**: append / read-back contract shared by every backend
//! - **RingStore**: in-process circular buffer keeping the newest `N` records
//! - **StreamStore**: a regular file (created fresh, removed on close) or a
//!   device node (left untouched), or any other appendable stream
//! - **SharedLog**: the single exclusive lock around the chosen store
//!
//! ## Example
//!
//! ```rust
//! use aesd_core::LogEntry;
//! use aesd_storage::{RingStore, SharedLog};
//!
//! let log = SharedLog::new(RingStore::with_capacity(10));
//! log.append(LogEntry::from("hello\n")).unwrap();
//! assert_eq!(log.snapshot().unwrap(), b"hello\n");
//! log.close().unwrap();
//! ```

pub mod error;
pub mod ring;
pub mod shared;
pub mod store;
pub mod stream;

// Re-exports
pub use error::{StorageError, StorageResult};
pub use ring::RingStore;
pub use shared::SharedLog;
pub use store::{BackendKind, LogStore};
pub use stream::StreamStore;
