//! Driver registry
//!
//! Drivers are looked up in two steps. [`DriverRegistry::load`] activates a
//! driver by identifier; [`DriverRegistry::connect`] then picks the first
//! active driver that accepts the connection URL. A failed `load` is not fatal
//! on its own: callers log it and the missing driver surfaces later as
//! [`DriverError::NoSuitableDriver`].

use crate::driver::{Connection, ConnectionParams, Driver, DriverError};
use std::sync::Arc;

/// Error activating a driver
#[derive(Debug, thiserror::Error)]
pub enum DriverLoadError {
    #[error("Unknown driver '{id}' (available: {})", available.join(", "))]
    UnknownDriver { id: String, available: Vec<String> },
}

/// Known and activated drivers
#[derive(Default, Clone)]
pub struct DriverRegistry {
    available: Vec<Arc<dyn Driver>>,
    loaded: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every driver compiled into this build
    pub fn with_builtin_drivers() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));

        registry
    }

    /// Make a driver available for loading
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.available.push(driver);
    }

    /// Names of every available driver
    pub fn available(&self) -> Vec<&'static str> {
        self.available.iter().map(|d| d.name()).collect()
    }

    /// Whether a driver matching `id` has been loaded
    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.iter().any(|d| d.matches(id))
    }

    /// Activate the driver named `id`, returning its canonical name
    pub fn load(&mut self, id: &str) -> Result<&'static str, DriverLoadError> {
        let driver = self
            .available
            .iter()
            .find(|d| d.matches(id))
            .cloned()
            .ok_or_else(|| DriverLoadError::UnknownDriver {
                id: id.to_string(),
                available: self.available().iter().map(|s| s.to_string()).collect(),
            })?;

        let name = driver.name();
        if !self.is_loaded(name) {
            tracing::debug!(driver = name, "Driver loaded");
            self.loaded.push(driver);
        }

        Ok(name)
    }

    /// Connect through the first loaded driver that accepts the URL
    pub async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, DriverError> {
        let driver = self
            .loaded
            .iter()
            .find(|d| d.accepts_url(&params.url))
            .ok_or_else(|| DriverError::NoSuitableDriver { url: params.url.clone() })?;

        tracing::debug!(driver = driver.name(), url = %params.url, "Connecting");
        driver.connect(params).await
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("available", &self.available())
            .field("loaded", &self.loaded.iter().map(|d| d.name()).collect::<Vec<_>>())
            .finish()
    }
}
