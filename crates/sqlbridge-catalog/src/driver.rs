//! Driver, connection and cursor traits

use crate::types::{RawRow, SqlType};
use sqlbridge_core::FetchSize;
use std::fmt;

/// Boxed cause carried by driver errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Where and how to connect
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Driver-specific connection URL
    pub url: String,

    pub username: Option<String>,

    /// Never printed by `Debug`
    pub password: Option<String>,

    /// Negotiate TLS where the driver supports it
    pub tls: bool,
}

impl ConnectionParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            tls: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .finish()
    }
}

/// Identifies the table a result column comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Dotted name with whichever qualifiers are known
    pub fn fqn(&self) -> String {
        [self.schema.as_deref(), Some(self.table.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Result column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Display label (an alias when the query gives one)
    pub label: String,

    /// Underlying column name, empty when the driver does not know it
    pub name: String,

    pub sql_type: SqlType,

    /// Source table, `None` for computed columns
    pub table: Option<TableRef>,
}

impl ColumnDescriptor {
    pub fn new(label: impl Into<String>, sql_type: SqlType) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            label,
            sql_type,
            table: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_table(mut self, table: TableRef) -> Self {
        self.table = Some(table);
        self
    }

    /// Label, falling back to the column name when the label is empty
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// One column of a table's primary key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyColumn {
    pub column: String,

    /// 1-based position within the key
    pub key_seq: u16,
}

/// One column pair of a foreign key declared on a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKey {
    /// Referencing column on the table that declares the key
    pub fk_column: String,

    pub pk_schema: Option<String>,
    pub pk_table: String,
    pub pk_column: String,

    /// 1-based position within the key
    pub key_seq: u16,
}

/// Errors raised by drivers
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("No suitable driver found for {url}")]
    NoSuitableDriver { url: String },

    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Metadata lookup failed: {message}")]
    Metadata {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Cannot read column '{column}' of type {type_name}")]
    Decode {
        column: String,
        type_name: String,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DriverError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    pub fn connection_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into(), source: None }
    }

    pub fn query_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Query { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata { message: message.into(), source: None }
    }

    pub fn metadata_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Metadata { message: message.into(), source: Some(Box::new(source)) }
    }
}

/// A database driver that can open connections
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Canonical driver identifier (e.g. "postgres")
    fn name(&self) -> &'static str;

    /// Other identifiers the driver answers to
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether `id` names this driver (case-insensitive)
    fn matches(&self, id: &str) -> bool {
        self.name().eq_ignore_ascii_case(id)
            || self.aliases().iter().any(|alias| alias.eq_ignore_ascii_case(id))
    }

    /// Whether this driver handles the given connection URL
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a new connection
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, DriverError>;
}

/// An open database connection
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Execute `query` behind a forward-only, read-only cursor
    ///
    /// `fetch_size` bounds how many rows the driver holds client-side at once.
    async fn open_cursor<'a>(
        &'a self,
        query: &str,
        fetch_size: FetchSize,
    ) -> Result<Box<dyn RowCursor + 'a>, DriverError>;

    /// Primary key columns of `table`, in key order
    async fn primary_keys(&self, table: &TableRef) -> Result<Vec<PrimaryKeyColumn>, DriverError>;

    /// Foreign keys declared on `table`, in driver order
    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, DriverError>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// A forward-only, read-only result cursor
#[async_trait::async_trait]
pub trait RowCursor: Send {
    /// Result column metadata, one entry per value in each row
    fn columns(&self) -> &[ColumnDescriptor];

    /// The next row, or `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<RawRow>, DriverError>;

    /// Release the cursor
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}
