//! Diagnostics logging for the aesd services
//!
//! Installs one global `tracing` subscriber built from a [`LogConfig`]:
//! console output as text or JSON lines, plus optional JSON-line files
//! written off-thread by `tracing-appender`.
//!
//! ```ignore
//! use aesd_logging::{AesdSubscriberBuilder, LogConfig};
//!
//! // dropping the guard flushes pending file output
//! let _guard = AesdSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//!
//! tracing::info!("Accepted connection");
//! ```
//!
//! A set `RUST_LOG` takes precedence over [`LogConfig::level`].

pub mod config;

pub use config::{ConsoleFormat, ConsoleOutput, FileOutput, JsonFields, LogConfig, RotationPolicy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log directory or file could not be created
    #[error("Failed to prepare log output: {0}")]
    Io(#[from] io::Error),

    /// Another global subscriber got there first
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builds and installs the process-wide subscriber
#[derive(Debug, Default)]
pub struct AesdSubscriberBuilder {
    config: LogConfig,
}

impl AesdSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, output: FileOutput) -> Self {
        self.config.file = Some(output);
        self
    }

    /// Install the subscriber
    ///
    /// Returns the file writer's guard when file output is configured; keep
    /// it alive until the process exits.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let (file_writer, guard) = match &self.config.file {
            Some(output) => {
                let (writer, guard) = open_file_writer(output)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let console = &self.config.console;
        let fields = &self.config.json;
        let text_console = (console.enabled && console.format == ConsoleFormat::Text).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_thread_names(true)
        });
        let json_console = (console.enabled && console.format == ConsoleFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(fields.span_list)
                .flatten_event(fields.flatten)
                .with_file(fields.source_location)
                .with_line_number(fields.source_location)
        });
        let file_lines = file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(fields.span_list)
                .flatten_event(fields.flatten)
                .with_file(fields.source_location)
                .with_line_number(fields.source_location)
                .with_writer(writer)
        });

        Registry::default()
            .with(filter)
            .with(text_console)
            .with(json_console)
            .with(file_lines)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// Like [`try_init`](Self::try_init), but a failure only prints a warning
    pub fn init(self) -> Option<WorkerGuard> {
        self.try_init().unwrap_or_else(|e| {
            eprintln!("Warning: {e}");
            None
        })
    }
}

fn open_file_writer(output: &FileOutput) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&output.directory)?;
    let rolling = |rotation| RollingFileAppender::new(rotation, &output.directory, &output.prefix);
    let pair = match output.rotation {
        RotationPolicy::Daily => tracing_appender::non_blocking(rolling(Rotation::DAILY)),
        RotationPolicy::Hourly => tracing_appender::non_blocking(rolling(Rotation::HOURLY)),
        RotationPolicy::Never => {
            let path = output.directory.join(format!("{}.log", output.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
    };
    Ok(pair)
}

/// Quiet subscriber for tests; safe to call from every test
pub fn init_testing() {
    let _ = AesdSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
