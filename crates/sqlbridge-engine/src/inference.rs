//! Schema inference from a probe query
//!
//! The probe query is executed once and only its result metadata is read.
//! Each result column becomes a schema column, in result order:
//! 1. The label (or the column name when the label is empty) is normalized
//!    into an identifier; the label itself becomes the description.
//! 2. The role comes from [`classify`].
//! 3. Date columns get the date dimension hint, when one is given.
//! 4. With key guessing on, [`KeyResolver`] may turn the column into the
//!    connection point or a reference.
//! 5. Columns that are still dates get the default date format.

use crate::classifier::classify;
use crate::keys::{KeyResolution, KeyResolver};
use sqlbridge_catalog::{Connection, ConnectionParams, DriverError, DriverRegistry};
use sqlbridge_core::{to_identifier, Column, FetchSize, LdmType, Schema, DEFAULT_DATE_FORMAT};
use std::collections::HashSet;
use std::num::NonZeroU32;

/// Inference switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Look up primary and foreign keys for every column
    pub guess_keys: bool,

    /// Shared date dimension attached to date columns
    pub date_dimension: Option<String>,

    /// Format attached to date columns
    pub date_format: String,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            guess_keys: false,
            date_dimension: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Inference error types
#[derive(Debug, thiserror::Error)]
pub enum InferError {
    #[error("error inferring schema from source")]
    Source(#[from] DriverError),
}

/// Builds a [`Schema`] from a probe query's result metadata
pub struct SchemaInferencer<'r> {
    registry: &'r DriverRegistry,
}

impl<'r> SchemaInferencer<'r> {
    pub fn new(registry: &'r DriverRegistry) -> Self {
        Self { registry }
    }

    /// Open one connection, infer the schema, and close the connection
    ///
    /// The connection is closed whether inference succeeds or fails; a
    /// failure while closing is logged and does not replace the result.
    pub async fn infer(
        &self,
        params: &ConnectionParams,
        schema_name: &str,
        probe_query: &str,
        options: &InferenceOptions,
    ) -> Result<Schema, InferError> {
        let connection = self.registry.connect(params).await?;

        let result = Self::infer_with(connection.as_ref(), schema_name, probe_query, options).await;

        if let Err(e) = connection.close().await {
            tracing::error!(error = %e, "Failed to close connection after inference");
        }

        let schema = result?;
        tracing::info!(
            schema = %schema.name,
            columns = schema.len(),
            connection_point = schema.connection_point().map(|c| c.name.as_str()),
            "Schema inferred"
        );
        Ok(schema)
    }

    /// Infer a schema over an already open connection
    pub async fn infer_with(
        connection: &dyn Connection,
        schema_name: &str,
        probe_query: &str,
        options: &InferenceOptions,
    ) -> Result<Schema, InferError> {
        let cursor = connection
            .open_cursor(probe_query, FetchSize::Rows(NonZeroU32::MIN))
            .await?;
        let descriptors = cursor.columns().to_vec();
        if let Err(e) = cursor.close().await {
            tracing::error!(error = %e, "Failed to close probe cursor");
        }

        let resolver = KeyResolver::new(connection);
        let mut schema = Schema::new(schema_name);
        let mut taken = HashSet::new();

        for descriptor in &descriptors {
            let label = descriptor.display_name();
            let name = unique_name(to_identifier(label), &mut taken);
            let classified = classify(&descriptor.sql_type);
            tracing::debug!(column = %name, sql_type = %descriptor.sql_type, role = %classified, "Classified column");

            let mut column = Column::new(name, classified, label);

            if let (Some(hint), LdmType::Date) = (&options.date_dimension, classified) {
                column.dimension_hint = Some(hint.clone());
            }

            if options.guess_keys {
                let resolution = resolver.resolve(&mut column, descriptor).await?;

                if resolution == KeyResolution::ConnectionPoint {
                    if let Some(existing) = schema.connection_point() {
                        tracing::warn!(
                            column = %column.name,
                            connection_point = %existing.name,
                            "Schema already has a connection point, keeping the classified role"
                        );
                        column.ldm_type = classified;
                    }
                }
            }

            if column.ldm_type == LdmType::Date {
                column = column.with_date_format(options.date_format.as_str());
            }

            schema.add_column(column);
        }

        Ok(schema)
    }
}

/// Suffix `name` with `_2`, `_3`, ... until it is not in `taken`
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
