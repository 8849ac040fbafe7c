use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Locations searched, in order, when no config file is given on the command line.
pub const SEARCH_PATHS: &[&str] = &[
    "/etc/apachetraffic/apachetraffic.yaml",
    "apachetraffic.yaml",
];

/// Daemon settings. Every key is optional; missing keys take their default.
///
/// The file may also carry pingora's own server settings, which are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graphite_address: String,
    pub graphite_port: u16,
    /// Root of the per-vhost and server traffic namespaces.
    pub graphite_prefix: String,
    /// Root of the server-wide per-handler namespace.
    pub server_prefix: String,
    pub bucket_secs: u64,
    pub flush_interval_secs: u64,
    pub connect_timeout_secs: u64,
    /// Overrides FQDN discovery when set.
    pub hostname: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graphite_address: "xgraphite".to_string(),
            graphite_port: 2003,
            graphite_prefix: "apachetraffic".to_string(),
            server_prefix: "apachetraffic_handlers".to_string(),
            bucket_secs: 60,
            flush_interval_secs: 60,
            connect_timeout_secs: 10,
            hostname: None,
        }
    }
}

impl Config {
    /// Parse YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, otherwise the first of [`SEARCH_PATHS`] that
    /// exists, otherwise the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::discover_in(explicit, SEARCH_PATHS.iter().map(PathBuf::from))
    }

    fn discover_in(
        explicit: Option<&Path>,
        candidates: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            log::info!("Loading config from {}", path.display());
            return Self::load(path);
        }
        for path in candidates {
            if path.is_file() {
                log::info!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }
        log::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graphite_address.trim().is_empty() {
            return Err(ConfigError::Invalid("graphite_address is empty".to_string()));
        }
        if self.graphite_port == 0 {
            return Err(ConfigError::Invalid("graphite_port must be non-zero".to_string()));
        }
        for (key, prefix) in [
            ("graphite_prefix", &self.graphite_prefix),
            ("server_prefix", &self.server_prefix),
        ] {
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be non-empty and contain no whitespace"
                )));
            }
        }
        for (key, secs) in [
            ("bucket_secs", self.bucket_secs),
            ("flush_interval_secs", self.flush_interval_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{key} must be non-zero")));
            }
        }
        Ok(())
    }

    /// `host:port` of the Graphite plaintext listener.
    pub fn graphite_addr(&self) -> String {
        format!("{}:{}", self.graphite_address, self.graphite_port)
    }

    pub fn bucket_granularity(&self) -> Duration {
        Duration::from_secs(self.bucket_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
