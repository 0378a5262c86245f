//! Database drivers for schema inference and extraction
//!
//! This crate provides the driver abstraction the engine talks to: opening a
//! connection, running a forward-only read-only cursor, and reading
//! primary/foreign key metadata.
//!
//! ## Features
//!
//! Enable database support via Cargo features:
//! - `postgres` - PostgreSQL support (default)
//!
//! The in-memory [`MockDriver`] is always available.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlbridge_catalog::{ConnectionParams, DriverRegistry};
//! use sqlbridge_core::FetchSize;
//!
//! let mut registry = DriverRegistry::with_builtin_drivers();
//! registry.load("org.postgresql.Driver")?;
//!
//! let params = ConnectionParams::new("postgres://localhost/shop").with_username("etl");
//! let connection = registry.connect(&params).await?;
//! let mut cursor = connection.open_cursor("SELECT * FROM orders", FetchSize::DEFAULT).await?;
//! while let Some(row) = cursor.next_row().await? {
//!     println!("{:?}", row);
//! }
//! ```

pub mod types;
pub mod driver;
pub mod registry;
pub mod mock;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use types::{SqlType, RawValue, RawRow};
pub use driver::{
    Driver, Connection, RowCursor, ConnectionParams, TableRef, ColumnDescriptor,
    PrimaryKeyColumn, ImportedKey, DriverError,
};
pub use registry::{DriverRegistry, DriverLoadError};
pub use mock::{MockDriver, MockResultSet};

#[cfg(feature = "postgres")]
pub use postgres::PostgresDriver;
