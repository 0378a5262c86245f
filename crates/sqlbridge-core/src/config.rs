//! Configuration schema (sqlbridge.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::format::{DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT};

/// Number of rows a driver buffers per round trip
///
/// Serialized as an integer: a positive row count, or any negative value for
/// [`FetchSize::Streaming`]. Zero is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum FetchSize {
    /// Fetch this many rows per round trip
    Rows(NonZeroU32),

    /// Row-by-row streaming, for drivers that otherwise buffer the whole result
    Streaming,
}

impl FetchSize {
    /// Default fetch size (256 rows)
    pub const DEFAULT: FetchSize = FetchSize::Rows(match NonZeroU32::new(256) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Rows per round trip, `None` when streaming
    pub fn rows(&self) -> Option<u32> {
        match self {
            Self::Rows(n) => Some(n.get()),
            Self::Streaming => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Parse a fetch size parameter value
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        let number: i64 = value.trim().parse().map_err(|_| ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: format!("'{}' is not an integer", value),
        })?;

        Self::try_from(number).map_err(|reason| ConfigError::InvalidParameter {
            name: name.to_string(),
            reason,
        })
    }
}

impl Default for FetchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for FetchSize {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Ok(Self::Streaming);
        }

        let rows = u32::try_from(value)
            .map_err(|_| format!("fetch size {} is too large", value))?;

        NonZeroU32::new(rows)
            .map(Self::Rows)
            .ok_or_else(|| "fetch size must be a positive row count or negative for streaming".to_string())
    }
}

impl From<FetchSize> for i64 {
    fn from(value: FetchSize) -> Self {
        match value {
            FetchSize::Rows(n) => i64::from(n.get()),
            FetchSize::Streaming => -1,
        }
    }
}

impl std::fmt::Display for FetchSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows(n) => write!(f, "{} rows", n),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Settings applied when a specific driver is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Fetch size used unless one is given explicitly
    #[serde(default)]
    pub fetch_size: Option<FetchSize>,
}

/// Driver settings that apply without any configuration
///
/// The MySQL driver buffers the whole result set unless asked to stream.
fn builtin_driver_settings(driver: &str) -> Option<DriverSettings> {
    match driver {
        "com.mysql.jdbc.Driver" | "com.mysql.cj.jdbc.Driver" | "mysql" => Some(DriverSettings {
            fetch_size: Some(FetchSize::Streaming),
        }),
        _ => None,
    }
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_datetime_format() -> String {
    DEFAULT_DATETIME_FORMAT.to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fetch size when neither the caller nor the driver table sets one
    #[serde(default)]
    pub default_fetch_size: FetchSize,

    /// Date format attached to inferred DATE columns
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Format for timestamps outside DATE columns
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Per-driver settings keyed by driver identifier
    #[serde(default)]
    pub drivers: HashMap<String, DriverSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_fetch_size: FetchSize::DEFAULT,
            date_format: default_date_format(),
            datetime_format: default_datetime_format(),
            drivers: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Settings for a driver: configured entry first, then the built-in table
    pub fn driver_settings(&self, driver: &str) -> Option<DriverSettings> {
        self.drivers
            .get(driver)
            .cloned()
            .or_else(|| builtin_driver_settings(driver))
    }

    /// Resolve the fetch size for a driver
    ///
    /// An explicit value wins over the driver table, which wins over
    /// `default_fetch_size`.
    pub fn fetch_size_for(&self, driver: &str, explicit: Option<FetchSize>) -> FetchSize {
        explicit
            .or_else(|| self.driver_settings(driver).and_then(|s| s.fetch_size))
            .unwrap_or(self.default_fetch_size)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Missing mandatory parameter '{0}'")]
    MissingParameter(String),

    #[error("Only one of the '{first}' and '{second}' parameters can be specified")]
    ConflictingParameters { first: String, second: String },

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_fetch_size.rows(), Some(256));
        assert_eq!(config.date_format, "yyyy-MM-dd");
        assert!(config.drivers.is_empty());
    }

    #[test]
    fn fetch_size_parsing() {
        assert_eq!(FetchSize::parse("fetch_size", "100").unwrap().rows(), Some(100));
        assert!(FetchSize::parse("fetch_size", "-2147483648").unwrap().is_streaming());
        assert!(FetchSize::parse("fetch_size", "-1").unwrap().is_streaming());

        match FetchSize::parse("fetch_size", "lots") {
            Err(ConfigError::InvalidParameter { name, .. }) => assert_eq!(name, "fetch_size"),
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
        assert!(FetchSize::parse("fetch_size", "0").is_err());
    }

    #[test]
    fn mysql_streams_by_default() {
        let config = Config::default();
        assert_eq!(
            config.fetch_size_for("com.mysql.jdbc.Driver", None),
            FetchSize::Streaming
        );
        assert_eq!(config.fetch_size_for("postgres", None), FetchSize::DEFAULT);
    }

    #[test]
    fn explicit_fetch_size_wins() {
        let config = Config::default();
        let explicit = FetchSize::parse("fetch_size", "10").unwrap();
        assert_eq!(config.fetch_size_for("mysql", Some(explicit)), explicit);
    }

    #[test]
    fn driver_table_from_toml() {
        let config = Config::from_toml(
            r#"
            default_fetch_size = 1000
            date_format = "dd.MM.yyyy"

            [drivers.postgres]
            fetch_size = -1
            "#,
        )
        .unwrap();

        assert_eq!(config.default_fetch_size.rows(), Some(1000));
        assert_eq!(config.date_format, "dd.MM.yyyy");
        assert_eq!(config.datetime_format, "yyyy-MM-dd HH:mm:ss");
        assert_eq!(config.fetch_size_for("postgres", None), FetchSize::Streaming);
        assert_eq!(config.fetch_size_for("other", None).rows(), Some(1000));
    }

    #[test]
    fn zero_fetch_size_rejected_in_toml() {
        assert!(matches!(
            Config::from_toml("default_fetch_size = 0"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.drivers.insert(
            "postgres".to_string(),
            DriverSettings { fetch_size: Some(FetchSize::Streaming) },
        );
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
