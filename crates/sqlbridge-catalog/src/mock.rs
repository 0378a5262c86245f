//! Mock driver for testing
//!
//! This driver serves predefined result sets and key metadata from memory.
//! It's useful for:
//! - Unit testing inference and extraction without a database
//! - Checking that connections and cursors are released on every path
//! - Observing how many rows a cursor buffers for a given fetch size
//! - Simulating failures at connect, query, metadata, mid-stream and close
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlbridge_catalog::{MockDriver, MockResultSet, ColumnDescriptor, SqlType, RawValue};
//!
//! let driver = MockDriver::new();
//! driver.add_result_set("SELECT id FROM orders", MockResultSet::new(
//!     vec![ColumnDescriptor::new("id", SqlType::Integer)],
//!     vec![vec![RawValue::Int(1)]],
//! )).await;
//! driver.add_primary_key("orders", &["id"]).await;
//!
//! // Fail on the third row
//! let failing = driver.clone().with_failure_after_rows(2);
//! ```

use crate::driver::{
    ColumnDescriptor, Connection, ConnectionParams, Driver, DriverError, ImportedKey,
    PrimaryKeyColumn, RowCursor, TableRef,
};
use crate::types::RawRow;
use sqlbridge_core::FetchSize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Rows and columns returned for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockResultSet {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<RawRow>,
}

impl MockResultSet {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MockFailures {
    connect: bool,
    query: bool,
    metadata: bool,
    after_rows: Option<usize>,
    close: bool,
}

#[derive(Default)]
struct MockState {
    /// Result sets by trimmed query text
    result_sets: RwLock<HashMap<String, MockResultSet>>,

    /// Key metadata by lowercased table name
    primary_keys: RwLock<HashMap<String, Vec<PrimaryKeyColumn>>>,
    imported_keys: RwLock<HashMap<String, Vec<ImportedKey>>>,

    fetch_sizes: RwLock<Vec<FetchSize>>,

    connect_attempts: AtomicUsize,
    open_connections: AtomicUsize,
    open_cursors: AtomicUsize,
    max_buffered_rows: AtomicUsize,
}

/// Mock driver for testing
///
/// Clones share the same data and counters, so a test can keep one handle
/// for assertions while a registry owns another.
///
/// # Example
///
/// ```rust,ignore
/// let driver = MockDriver::new()
///     .with_failure_after_rows(1)  // second row fails
///     .with_close_failure();       // and closing the connection fails too
/// ```
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
    failures: MockFailures,
}

impl MockDriver {
    /// Create a mock driver with no data
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every connection attempt
    pub fn with_connect_failure(mut self) -> Self {
        self.failures.connect = true;
        self
    }

    /// Fail every query
    pub fn with_query_failure(mut self) -> Self {
        self.failures.query = true;
        self
    }

    /// Fail every key metadata lookup
    pub fn with_metadata_failure(mut self) -> Self {
        self.failures.metadata = true;
        self
    }

    /// Fail when reading past the first `rows` rows of any result
    pub fn with_failure_after_rows(mut self, rows: usize) -> Self {
        self.failures.after_rows = Some(rows);
        self
    }

    /// Fail when a connection is closed (it is still released)
    pub fn with_close_failure(mut self) -> Self {
        self.failures.close = true;
        self
    }

    /// Serve `result` for `query`
    pub async fn add_result_set(&self, query: &str, result: MockResultSet) {
        self.state
            .result_sets
            .write()
            .await
            .insert(query.trim().to_string(), result);
    }

    /// Declare the primary key of `table`, in key order
    pub async fn add_primary_key(&self, table: &str, columns: &[&str]) {
        let key = columns
            .iter()
            .zip(1u16..)
            .map(|(column, key_seq)| PrimaryKeyColumn { column: column.to_string(), key_seq })
            .collect();

        self.state
            .primary_keys
            .write()
            .await
            .insert(table.to_lowercase(), key);
    }

    /// Declare a foreign key column on `table`
    ///
    /// Keys are reported in the order they are added.
    pub async fn add_imported_key(&self, table: &str, key: ImportedKey) {
        self.state
            .imported_keys
            .write()
            .await
            .entry(table.to_lowercase())
            .or_default()
            .push(key);
    }

    /// Number of `connect` calls, failed ones included
    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed
    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    /// Cursors opened and not yet closed
    pub fn open_cursors(&self) -> usize {
        self.state.open_cursors.load(Ordering::SeqCst)
    }

    /// Largest number of rows any cursor held client-side at once
    pub fn max_buffered_rows(&self) -> usize {
        self.state.max_buffered_rows.load(Ordering::SeqCst)
    }

    /// Fetch sizes requested by every `open_cursor` call
    pub async fn fetch_sizes(&self) -> Vec<FetchSize> {
        self.state.fetch_sizes.read().await.clone()
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["org.sqlbridge.MockDriver"]
    }

    fn accepts_url(&self, url: &str) -> bool {
        url.starts_with("mock:")
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, DriverError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if self.failures.connect {
            return Err(DriverError::connection(format!("cannot reach {}", params.url)));
        }

        self.state.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            failures: self.failures,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    failures: MockFailures,
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn open_cursor<'a>(
        &'a self,
        query: &str,
        fetch_size: FetchSize,
    ) -> Result<Box<dyn RowCursor + 'a>, DriverError> {
        self.state.fetch_sizes.write().await.push(fetch_size);

        if self.failures.query {
            return Err(DriverError::query("syntax error at or near \"SELEC\""));
        }

        let result = self
            .state
            .result_sets
            .read()
            .await
            .get(query.trim())
            .cloned()
            .ok_or_else(|| DriverError::query(format!("no result set for query: {}", query.trim())))?;

        self.state.open_cursors.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockCursor {
            columns: result.columns,
            server: result.rows.into(),
            buffer: VecDeque::new(),
            batch: fetch_size.rows().map_or(1, |n| n as usize),
            delivered: 0,
            fail_after: self.failures.after_rows,
            state: Arc::clone(&self.state),
        }))
    }

    async fn primary_keys(&self, table: &TableRef) -> Result<Vec<PrimaryKeyColumn>, DriverError> {
        if self.failures.metadata {
            return Err(DriverError::metadata(format!("cannot read primary keys of {}", table)));
        }

        Ok(self
            .state
            .primary_keys
            .read()
            .await
            .get(&table.table.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, DriverError> {
        if self.failures.metadata {
            return Err(DriverError::metadata(format!("cannot read imported keys of {}", table)));
        }

        Ok(self
            .state
            .imported_keys
            .read()
            .await
            .get(&table.table.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.state.open_connections.fetch_sub(1, Ordering::SeqCst);

        if self.failures.close {
            return Err(DriverError::connection("connection already broken"));
        }
        Ok(())
    }
}

/// Cursor pulling rows from a "server side" queue in fetch-size batches
struct MockCursor {
    columns: Vec<ColumnDescriptor>,
    server: VecDeque<RawRow>,
    buffer: VecDeque<RawRow>,
    batch: usize,
    delivered: usize,
    fail_after: Option<usize>,
    state: Arc<MockState>,
}

#[async_trait::async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<RawRow>, DriverError> {
        if self.fail_after == Some(self.delivered) && !(self.buffer.is_empty() && self.server.is_empty()) {
            return Err(DriverError::query(format!(
                "connection lost after {} rows",
                self.delivered
            )));
        }

        if self.buffer.is_empty() {
            let take = self.batch.min(self.server.len());
            self.buffer.extend(self.server.drain(..take));
            self.state
                .max_buffered_rows
                .fetch_max(self.buffer.len(), Ordering::SeqCst);
        }

        let row = self.buffer.pop_front();
        if row.is_some() {
            self.delivered += 1;
        }
        Ok(row)
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.state.open_cursors.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawValue, SqlType};
    use std::num::NonZeroU32;

    fn numbers(count: i64) -> MockResultSet {
        MockResultSet::new(
            vec![ColumnDescriptor::new("n", SqlType::Integer)],
            (0..count).map(|n| vec![RawValue::Int(n)]).collect(),
        )
    }

    fn rows(n: u32) -> FetchSize {
        FetchSize::Rows(NonZeroU32::new(n).unwrap())
    }

    async fn drain(cursor: &mut Box<dyn RowCursor + '_>) -> Vec<RawRow> {
        let mut out = Vec::new();
        while let Some(row) = cursor.next_row().await.unwrap() {
            out.push(row);
        }
        out
    }

    #[tokio::test]
    async fn serves_result_sets() {
        let driver = MockDriver::new();
        driver.add_result_set("SELECT n FROM t", numbers(5)).await;

        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();
        let mut cursor = connection.open_cursor("  SELECT n FROM t ", rows(2)).await.unwrap();

        assert_eq!(cursor.columns().len(), 1);
        let fetched = drain(&mut cursor).await;
        assert_eq!(fetched.len(), 5);
        assert_eq!(fetched[4], vec![RawValue::Int(4)]);
        assert_eq!(driver.max_buffered_rows(), 2);

        cursor.close().await.unwrap();
        connection.close().await.unwrap();
        assert_eq!(driver.open_cursors(), 0);
        assert_eq!(driver.open_connections(), 0);
        assert_eq!(driver.fetch_sizes().await, vec![rows(2)]);
    }

    #[tokio::test]
    async fn streaming_buffers_one_row() {
        let driver = MockDriver::new();
        driver.add_result_set("SELECT n FROM t", numbers(10)).await;

        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();
        let mut cursor = connection.open_cursor("SELECT n FROM t", FetchSize::Streaming).await.unwrap();

        assert_eq!(drain(&mut cursor).await.len(), 10);
        assert_eq!(driver.max_buffered_rows(), 1);
    }

    #[tokio::test]
    async fn unknown_query_fails() {
        let driver = MockDriver::new();
        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();

        let result = connection.open_cursor("SELECT 1", FetchSize::DEFAULT).await;
        assert!(matches!(result, Err(DriverError::Query { .. })));
        assert_eq!(driver.open_cursors(), 0);
    }

    #[tokio::test]
    async fn failure_after_rows() {
        let driver = MockDriver::new().with_failure_after_rows(2);
        driver.add_result_set("SELECT n FROM t", numbers(5)).await;

        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();
        let mut cursor = connection.open_cursor("SELECT n FROM t", rows(10)).await.unwrap();

        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(matches!(cursor.next_row().await, Err(DriverError::Query { .. })));
    }

    #[tokio::test]
    async fn key_metadata_by_table_name() {
        let driver = MockDriver::new();
        driver.add_primary_key("ORDERS", &["id"]).await;
        driver
            .add_imported_key("orders", ImportedKey {
                fk_column: "customer_id".to_string(),
                pk_schema: None,
                pk_table: "CUSTOMERS".to_string(),
                pk_column: "id".to_string(),
                key_seq: 1,
            })
            .await;

        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();
        let table = TableRef::new("Orders");

        let pk = connection.primary_keys(&table).await.unwrap();
        assert_eq!(pk, vec![PrimaryKeyColumn { column: "id".to_string(), key_seq: 1 }]);

        let fks = connection.imported_keys(&table).await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].pk_table, "CUSTOMERS");

        assert!(connection.primary_keys(&TableRef::new("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn simulated_failures() {
        let driver = MockDriver::new().with_connect_failure();
        assert!(driver.connect(&ConnectionParams::new("mock:db")).await.is_err());
        assert_eq!(driver.connect_attempts(), 1);
        assert_eq!(driver.open_connections(), 0);

        let driver = MockDriver::new().with_metadata_failure().with_close_failure();
        let connection = driver.connect(&ConnectionParams::new("mock:db")).await.unwrap();
        assert!(matches!(
            connection.primary_keys(&TableRef::new("orders")).await,
            Err(DriverError::Metadata { .. })
        ));
        assert!(connection.close().await.is_err());
        assert_eq!(driver.open_connections(), 0);
    }
}
