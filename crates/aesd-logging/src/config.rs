//! What the subscriber writes, and where

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Diagnostics settings, usually the `[log]` table of a service config
///
/// Missing keys fall back to [`LogConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleOutput,
    /// Also write JSON lines to files when present
    pub file: Option<FileOutput>,
    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            console: ConsoleOutput::default(),
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    /// Debug level, colored text on the terminal
    pub fn development() -> Self {
        Self {
            level: "debug".into(),
            console: ConsoleOutput {
                ansi: true,
                ..ConsoleOutput::default()
            },
            ..Self::default()
        }
    }

    /// Detached service: nothing on the terminal, JSON lines under `log_dir`
    pub fn daemon(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleOutput {
                enabled: false,
                ..ConsoleOutput::default()
            },
            file: Some(FileOutput {
                directory: log_dir,
                ..FileOutput::default()
            }),
            ..Self::default()
        }
    }

    /// Warnings only, plain text
    pub fn testing() -> Self {
        Self {
            level: "warn".into(),
            ..Self::default()
        }
    }
}

/// How console lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Terminal output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleOutput {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// Color escape codes; only meaningful for [`ConsoleFormat::Text`]
    pub ansi: bool,
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Text,
            ansi: false,
        }
    }
}

/// Output to files on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutput {
    /// Created if missing
    pub directory: PathBuf,
    /// File name stem, e.g. `aesdsocket` gives `aesdsocket.2024-03-05`
    pub prefix: String,
    pub rotation: RotationPolicy,
}

impl Default for FileOutput {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/log/aesd"),
            prefix: "aesdsocket".into(),
            rotation: RotationPolicy::Daily,
        }
    }
}

/// When a new log file is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    /// One `<prefix>.log`, truncated at startup
    Never,
}

/// Which fields JSON lines carry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// Put event fields at the top level instead of under `fields`
    pub flatten: bool,
    /// Add the list of entered spans (e.g. `connection{id, peer}`)
    pub span_list: bool,
    /// Add source file and line
    pub source_location: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            flatten: true,
            span_list: true,
            source_location: false,
        }
    }
}
