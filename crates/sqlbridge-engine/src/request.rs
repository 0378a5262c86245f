//! Validated inference and extraction requests
//!
//! Raw parameters come from the command line (or any other caller) as
//! optional strings. Everything is checked here, before a connection is
//! attempted: mandatory parameters, the query / query file exclusivity and
//! the fetch size.

use crate::inference::InferenceOptions;
use sqlbridge_catalog::ConnectionParams;
use sqlbridge_core::{Config, ConfigError, FetchSize};
use std::path::PathBuf;

/// Raw inference parameters
#[derive(Debug, Clone, Default)]
pub struct InferenceParams {
    pub driver: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub query: Option<String>,

    /// Dataset name of the generated schema
    pub name: Option<String>,

    pub guess_keys: bool,
    pub date_dimension: Option<String>,
    pub tls: bool,
}

/// A checked inference request
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub driver: String,
    pub connection: ConnectionParams,
    pub name: String,
    pub query: String,
    pub options: InferenceOptions,
}

impl InferenceRequest {
    pub fn from_params(params: InferenceParams, config: &Config) -> Result<Self, ConfigError> {
        let driver = require(params.driver, "driver")?;
        let url = require(params.url, "url")?;
        let name = require(params.name, "name")?;
        let query = require(params.query, "query")?;

        Ok(Self {
            driver,
            connection: connection_params(url, params.username, params.password, params.tls),
            name,
            query,
            options: InferenceOptions {
                guess_keys: params.guess_keys,
                date_dimension: params.date_dimension.filter(|d| !d.trim().is_empty()),
                date_format: config.date_format.clone(),
            },
        })
    }
}

/// Raw extraction parameters
#[derive(Debug, Clone, Default)]
pub struct ExtractParams {
    pub driver: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Query text; exclusive with `query_file`
    pub query: Option<String>,

    /// File holding the query text; exclusive with `query`
    pub query_file: Option<PathBuf>,

    /// Rows per round trip, negative for streaming
    pub fetch_size: Option<String>,

    pub tls: bool,
}

/// A checked extraction request
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub driver: String,
    pub connection: ConnectionParams,
    pub query: String,
    pub fetch_size: FetchSize,
}

impl ExtractRequest {
    /// Validate parameters and resolve the query and fetch size
    ///
    /// Fetch size precedence: explicit parameter, then the driver table in
    /// `config`, then `config.default_fetch_size`.
    pub fn from_params(params: ExtractParams, config: &Config) -> Result<Self, ConfigError> {
        let driver = require(params.driver, "driver")?;
        let url = require(params.url, "url")?;

        let explicit = params
            .fetch_size
            .as_deref()
            .map(|value| FetchSize::parse("fetch_size", value))
            .transpose()?;
        let fetch_size = config.fetch_size_for(&driver, explicit);

        let query = match (params.query, params.query_file) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::ConflictingParameters {
                    first: "query".to_string(),
                    second: "query_file".to_string(),
                })
            }
            (None, None) => return Err(ConfigError::MissingParameter("query".to_string())),
            (Some(query), None) => query,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?,
        };

        if query.trim().is_empty() {
            return Err(ConfigError::MissingParameter("query".to_string()));
        }

        Ok(Self {
            driver,
            connection: connection_params(url, params.username, params.password, params.tls),
            query,
            fetch_size,
        })
    }
}

fn require(value: Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

fn connection_params(
    url: String,
    username: Option<String>,
    password: Option<String>,
    tls: bool,
) -> ConnectionParams {
    let mut params = ConnectionParams::new(url).with_tls(tls);
    params.username = username;
    params.password = password;
    params
}

/// First `max` characters of a query on one line, for logging
pub fn preview(query: &str, max: usize) -> String {
    let flat = query.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
