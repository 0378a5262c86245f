//! Connector capabilities
//!
//! [`SchemaInferrer`] and [`Extractor`] are the entry points callers program
//! against. [`SqlConnector`] implements both on top of a [`DriverRegistry`].

use crate::extract::{ExtractError, StreamingExtractor};
use crate::inference::{InferError, SchemaInferencer};
use crate::request::{preview, ExtractRequest, InferenceRequest};
use crate::sink::RowSink;
use crate::transform::RowTransformer;
use sqlbridge_catalog::{DriverLoadError, DriverRegistry};
use sqlbridge_core::Schema;

/// Derives a schema from a probe query
#[async_trait::async_trait]
pub trait SchemaInferrer: Send + Sync {
    async fn infer_schema(&self, request: &InferenceRequest) -> Result<Schema, InferError>;
}

/// Streams query results into a sink
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the number of data rows written
    async fn extract(
        &self,
        request: &ExtractRequest,
        schema: &Schema,
        transformer: &dyn RowTransformer,
        sink: &mut dyn RowSink,
    ) -> Result<u64, ExtractError>;
}

/// Relational database connector
#[derive(Debug, Clone, Default)]
pub struct SqlConnector {
    registry: DriverRegistry,
}

impl SqlConnector {
    pub fn new(registry: DriverRegistry) -> Self {
        Self { registry }
    }

    /// Connector knowing every driver compiled into this build
    pub fn with_builtin_drivers() -> Self {
        Self::new(DriverRegistry::with_builtin_drivers())
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Activate a driver by identifier
    ///
    /// A failure is logged as a warning and returned, but callers are expected
    /// to carry on: the missing driver is reported again, with the URL, when
    /// the connection is attempted.
    pub fn load_driver(&mut self, id: &str) -> Result<&'static str, DriverLoadError> {
        self.registry.load(id).map_err(|e| {
            tracing::warn!(driver = id, error = %e, "Driver could not be loaded");
            e
        })
    }
}

#[async_trait::async_trait]
impl SchemaInferrer for SqlConnector {
    async fn infer_schema(&self, request: &InferenceRequest) -> Result<Schema, InferError> {
        tracing::debug!(driver = %request.driver, query = %preview(&request.query, 256), "Inferring schema");

        SchemaInferencer::new(&self.registry)
            .infer(&request.connection, &request.name, &request.query, &request.options)
            .await
    }
}

#[async_trait::async_trait]
impl Extractor for SqlConnector {
    async fn extract(
        &self,
        request: &ExtractRequest,
        schema: &Schema,
        transformer: &dyn RowTransformer,
        sink: &mut dyn RowSink,
    ) -> Result<u64, ExtractError> {
        let rows = StreamingExtractor::new(&self.registry)
            .extract(&request.connection, &request.query, request.fetch_size, schema, transformer, sink)
            .await?;

        tracing::info!(query = %preview(&request.query, 256), rows, "Extraction finished");
        Ok(rows)
    }
}
