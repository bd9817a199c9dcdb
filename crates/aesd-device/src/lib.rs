//! # aesd device
//!
//! Device-style front end over the aesd circular log.
//!
//! An [`AesdDevice`] holds the newest records in a ring together with one
//! device-wide pending write. [`DeviceHandle`]s opened on it behave like file
//! descriptors on the aesd character device:
//!
//! - `write` accumulates bytes until a newline completes a record; the whole
//!   accumulated write becomes one record
//! - `read` returns at most the rest of the record under the file position
//! - `seek` only supports absolute positioning
//!
//! Handles implement [`std::io::Read`], [`std::io::Write`] and
//! [`std::io::Seek`], so a handle can stand in wherever a file would.
//!
//! ```rust
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! use aesd_device::AesdDevice;
//!
//! let device = Arc::new(AesdDevice::new());
//! device.open().write_all(b"hello\n").unwrap();
//!
//! let mut out = String::new();
//! device.open().read_to_string(&mut out).unwrap();
//! assert_eq!(out, "hello\n");
//! ```

pub mod device;
pub mod error;

pub use device::{AesdDevice, DeviceHandle, Whence};
pub use error::DeviceError;
