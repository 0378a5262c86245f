//! sqlbridge core
//!
//! Domain model shared by the inference and extraction pipelines:
//! logical column roles, the schema definition artifact, identifier
//! normalization, date-format patterns and the TOML configuration.

pub mod schema;
pub mod identifier;
pub mod format;
pub mod config;

pub use schema::{LdmType, Column, ReferenceTarget, Schema, SchemaError};
pub use identifier::to_identifier;
pub use format::{DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT, to_chrono_pattern};
pub use config::{Config, ConfigError, DriverSettings, FetchSize};
