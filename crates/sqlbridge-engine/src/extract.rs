//! Streaming extraction
//!
//! One connection and one forward-only cursor per run. Rows are pulled one at
//! a time, canonicalized, transformed, written and flushed before the next
//! row is fetched, so memory use does not grow with the result size.
//!
//! State progression: `Idle -> Connected -> Querying -> Streaming -> Closed`.
//! `Closed` is reached on success and on every error; the cursor and the
//! connection are closed on the way, and failures while closing are logged
//! without replacing the original error.

use crate::canonical::CanonicalRows;
use crate::request::preview;
use crate::sink::RowSink;
use crate::transform::{RowTransformer, TransformError};
use sqlbridge_catalog::{Connection, ConnectionParams, DriverError, DriverRegistry, RowCursor};
use sqlbridge_core::{FetchSize, Schema};
use std::io;

/// Extraction error types
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("error retrieving data from source")]
    Source(#[from] DriverError),

    #[error("Cannot transform row {row}")]
    Transform {
        row: u64,
        #[source]
        source: TransformError,
    },

    #[error("Cannot write output: {0}")]
    Sink(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractState {
    Idle,
    Connected,
    Querying,
    Streaming,
    Closed,
}

fn advance(state: &mut ExtractState, next: ExtractState) {
    tracing::debug!(from = ?state, to = ?next, "Extraction state");
    *state = next;
}

/// Streams a query result through a transformer into a sink
pub struct StreamingExtractor<'r> {
    registry: &'r DriverRegistry,
}

impl<'r> StreamingExtractor<'r> {
    pub fn new(registry: &'r DriverRegistry) -> Self {
        Self { registry }
    }

    /// Run `query` and write the header plus one output row per result row
    ///
    /// Returns the number of data rows written. The sink is flushed after
    /// every row and closed on success.
    pub async fn extract(
        &self,
        params: &ConnectionParams,
        query: &str,
        fetch_size: FetchSize,
        schema: &Schema,
        transformer: &dyn RowTransformer,
        sink: &mut dyn RowSink,
    ) -> Result<u64, ExtractError> {
        let mut state = ExtractState::Idle;

        let connection = self.registry.connect(params).await?;
        advance(&mut state, ExtractState::Connected);

        let result = Self::run_query(
            connection.as_ref(),
            &mut state,
            query,
            fetch_size,
            schema,
            transformer,
            sink,
        )
        .await;

        if let Err(e) = connection.close().await {
            tracing::error!(error = %e, "Failed to close connection after extraction");
        }
        advance(&mut state, ExtractState::Closed);

        match &result {
            Ok(rows) => tracing::info!(rows, "Finished retrieving data"),
            Err(e) => tracing::debug!(error = %e, "Extraction failed"),
        }
        result
    }

    async fn run_query(
        connection: &dyn Connection,
        state: &mut ExtractState,
        query: &str,
        fetch_size: FetchSize,
        schema: &Schema,
        transformer: &dyn RowTransformer,
        sink: &mut dyn RowSink,
    ) -> Result<u64, ExtractError> {
        advance(state, ExtractState::Querying);
        tracing::debug!(query = %preview(query, 256), fetch_size = %fetch_size, "Executing query");

        let mut cursor = connection.open_cursor(query, fetch_size).await?;

        let result = Self::stream_rows(cursor.as_mut(), state, schema, transformer, sink).await;

        if let Err(e) = cursor.close().await {
            tracing::error!(error = %e, "Failed to close cursor");
        }
        result
    }

    async fn stream_rows(
        cursor: &mut dyn RowCursor,
        state: &mut ExtractState,
        schema: &Schema,
        transformer: &dyn RowTransformer,
        sink: &mut dyn RowSink,
    ) -> Result<u64, ExtractError> {
        sink.write_row(&transformer.header(schema))?;
        sink.flush()?;
        advance(state, ExtractState::Streaming);

        let mut rows = CanonicalRows::new(cursor);
        let mut count: u64 = 0;

        while let Some(row) = rows.next().await? {
            let output = transformer
                .transform(&row, schema)
                .map_err(|source| ExtractError::Transform { row: count + 1, source })?;

            sink.write_row(&output)?;
            sink.flush()?;
            count += 1;
        }

        sink.close()?;
        Ok(count)
    }
}
