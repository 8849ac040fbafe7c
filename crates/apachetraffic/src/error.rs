//! Error types for the traffic daemon.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`crate::configuration::Config`].
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A value parsed but is unusable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A log line that cannot be turned into a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected at least 5 fields, found {found}")]
    MissingFields { found: usize },
}

/// Transport failures during a flush cycle. The cycle's buckets are lost.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Timed out connecting to {addr} after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("Failed to write to {addr}: {source}")]
    Write {
        addr: String,
        source: std::io::Error,
    },
}

/// Failure to discover the fully-qualified host name.
#[derive(Debug, Error)]
pub enum HostnameError {
    #[error("Failed to run hostname: {0}")]
    Command(#[from] std::io::Error),

    #[error("hostname exited with {0}")]
    Status(ExitStatus),

    #[error("hostname returned an empty name")]
    Empty,
}
