//! Configuration for the socket server
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags, each layer overriding the previous one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use aesd_core::{DEFAULT_CAPACITY, DEFAULT_DELIMITER};
use aesd_logging::LogConfig;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port the service listens on
pub const DEFAULT_PORT: u16 = 9000;
/// Where the file backend keeps the log
pub const DEFAULT_DATA_PATH: &str = "/var/tmp/aesdsocketdata";
/// Device node used by the device backend
pub const DEFAULT_DEVICE_PATH: &str = "/dev/aesdchar";
/// Largest single read from a peer
pub const DEFAULT_READ_CHUNK_SIZE: usize = 100;
/// Seconds between timestamp records
pub const DEFAULT_TIMESTAMP_INTERVAL_SECS: u64 = 10;

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What backs the shared log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process circular buffer of the newest records
    Ring,
    /// Regular file, truncated at startup and removed at shutdown
    #[default]
    File,
    /// Existing device node; no timestamp records are generated
    Device,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: IpAddr,
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Backing store for the log
    pub backend: Backend,
    /// Log file for [`Backend::File`]
    pub data_path: PathBuf,
    /// Device node for [`Backend::Device`]
    pub device_path: PathBuf,
    /// Records kept by [`Backend::Ring`]
    pub ring_capacity: usize,
    /// Buffer size for each read from a peer
    pub read_chunk_size: usize,
    /// Byte that terminates a record
    pub delimiter: u8,
    /// Seconds between timestamp records; 0 disables them
    pub timestamp_interval_secs: u64,
    /// Diagnostics output
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            backend: Backend::default(),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            ring_capacity: DEFAULT_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            delimiter: DEFAULT_DELIMITER,
            timestamp_interval_secs: DEFAULT_TIMESTAMP_INTERVAL_SECS,
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a TOML config file, filling gaps with defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text, filling gaps with defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_capacity == 0 {
            return Err(ConfigError::Invalid("ring_capacity must be at least 1".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read_chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Period of the timestamp producer, if enabled
    pub fn timestamp_interval(&self) -> Option<Duration> {
        (self.timestamp_interval_secs > 0).then(|| Duration::from_secs(self.timestamp_interval_secs))
    }

    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the timestamp period in seconds; 0 disables the producer
    pub fn with_timestamp_interval_secs(mut self, secs: u64) -> Self {
        self.timestamp_interval_secs = secs;
        self
    }
}

/// Command line of the `aesdsocket` binary
#[derive(Debug, Parser)]
#[command(name = "aesdsocket", about = "Append-only record log served over TCP")]
pub struct Cli {
    /// Run as a daemon after binding the listening socket
    #[arg(short = 'd', long)]
    pub daemon: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Backing store for the log
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merge the config file (if any) with the flags given on the command line
    pub fn resolve_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_service() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.data_path, PathBuf::from("/var/tmp/aesdsocketdata"));
        assert_eq!(config.ring_capacity, 10);
        assert_eq!(config.read_chunk_size, 100);
        assert_eq!(config.delimiter, b'\n');
        assert_eq!(config.timestamp_interval(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9100
            backend = "ring"
            ring_capacity = 4

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.backend, Backend::Ring);
        assert_eq!(config.ring_capacity, 4);
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ServerConfig::from_toml("ring_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ServerConfig::from_toml("read_chunk_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = ServerConfig::from_toml(r#"backend = "tape""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_interval_disables_producer() {
        let config = ServerConfig::default().with_timestamp_interval_secs(0);
        assert!(config.timestamp_interval().is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aesdsocket.toml");
        std::fs::write(&path, "port = 9100\nbackend = \"device\"\n").unwrap();

        let cli = Cli::parse_from([
            "aesdsocket",
            "-d",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9200",
            "--log-level",
            "trace",
        ]);
        assert!(cli.daemon);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.backend, Backend::Device);
        assert_eq!(config.log.level, "trace");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::parse_from(["aesdsocket", "-c", "/nonexistent/aesdsocket.toml"]);
        assert!(matches!(cli.resolve_config(), Err(ConfigError::Read { .. })));
    }
}
