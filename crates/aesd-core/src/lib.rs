//! # aesd core
//!
//! Data structures shared by every front end of the aesd record log.
//!
//! - [`LogEntry`]: one complete, delimiter-terminated record
//! - [`CircularLogBuffer`]: fixed ring of the most recent `N` records with
//!   oldest-first eviction and logical byte-offset lookup
//! - [`RecordFramer`]: per-writer accumulator that splits a byte stream into
//!   records on a delimiter byte
//!
//! None of these types lock; whoever shares them provides the mutual
//! exclusion.
//!
//! ## Example
//!
//! ```rust
//! use aesd_core::{CircularLogBuffer, RecordFramer};
//!
//! let mut buffer = CircularLogBuffer::with_capacity(2);
//! let mut framer = RecordFramer::new();
//!
//! assert!(framer.feed(b"hel").is_none());
//! let record = framer.feed(b"lo\n").unwrap();
//! assert!(buffer.append(record).is_none());
//!
//! let (entry, offset) = buffer.find_by_offset(4).unwrap();
//! assert_eq!(&entry.data()[offset..], b"o\n");
//! ```

pub mod circular;
pub mod entry;
pub mod framer;

pub use circular::{CircularLogBuffer, DEFAULT_CAPACITY, Drain, Iter};
pub use entry::LogEntry;
pub use framer::{DEFAULT_DELIMITER, RecordFramer, Trailing};
