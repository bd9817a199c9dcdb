//! # aesd server
//!
//! TCP front end for the aesd record log. Every connection sends one
//! newline-terminated record, which is appended to the shared log, and gets
//! the whole log back before the server closes the connection.
//!
//! ## Components
//!
//! - [`Supervisor`]: accept loop, worker bookkeeping, orderly shutdown
//! - [`ConnectionWorker`]: one thread per connection
//! - [`PeriodicProducer`]: appends a timestamp record on a fixed period
//! - [`ShutdownHandle`]: stops the supervisor from a signal thread or a test
//!
//! ## Example
//!
//! ```no_run
//! use aesd_server::{Backend, ServerConfig, Supervisor};
//!
//! let config = ServerConfig::default().with_backend(Backend::Ring).with_port(0);
//! let supervisor = Supervisor::bind(&config)?;
//! let shutdown = supervisor.shutdown_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     shutdown.trigger();
//! });
//! supervisor.run()?;
//! # Ok::<(), aesd_server::ServerError>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod process;
pub mod producer;
pub mod shutdown;
pub mod supervisor;
pub mod worker;

// Re-exports
pub use config::{Backend, Cli, ConfigError, ServerConfig};
pub use context::{ConnectionStats, ServerContext};
pub use error::{ConnectionError, ServerError, ServerResult};
pub use producer::{PeriodicProducer, timestamp_record};
pub use shutdown::ShutdownHandle;
pub use supervisor::{RunSummary, Supervisor, SupervisorState, open_log};
pub use worker::{ConnectionId, ConnectionWorker, WorkerOutcome};
