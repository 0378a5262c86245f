//! PostgreSQL driver
//!
//! Connects with tokio-postgres and reads results through server-side
//! cursors, so at most `fetch_size` rows are held client-side. It works with:
//! - PostgreSQL 9.4+
//! - Amazon Redshift
//! - CockroachDB
//! - Other PostgreSQL-compatible databases
//!
//! ## Connection URLs
//!
//! `postgres://`, `postgresql://` and `jdbc:postgresql://` URLs are accepted.
//! Explicit username and password override the ones in the URL. TLS is
//! negotiated via native-tls when requested.
//!
//! Columns whose type has no native decoding here (intervals, network
//! addresses, enums, arrays, ...) are cast to text on the server, so every
//! value reaches the caller.
//!
//! Key metadata comes from `pg_constraint`.
//!
//! Reference: https://www.postgresql.org/docs/current/sql-declare.html

use crate::driver::{
    ColumnDescriptor, Connection, ConnectionParams, Driver, DriverError, ImportedKey,
    PrimaryKeyColumn, RowCursor, TableRef,
};
use crate::types::{RawRow, RawValue, SqlType};
use futures::TryStreamExt;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use sqlbridge_core::FetchSize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row, RowStream, Statement};

const CURSOR_NAME: &str = "sqlbridge_cursor";
const PROJECTION_ALIAS: &str = "sqlbridge_result";

const RESOLVE_COLUMNS_SQL: &str = "\
SELECT c.oid, n.nspname, c.relname, a.attnum, a.attname
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_attribute a ON a.attrelid = c.oid
WHERE c.oid = ANY($1) AND a.attnum > 0";

const PRIMARY_KEYS_SQL: &str = "\
SELECT a.attname, k.ord
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE con.contype = 'p'
  AND c.relname = $1
  AND (($2::text IS NULL AND pg_table_is_visible(c.oid)) OR n.nspname = $2)
ORDER BY k.ord";

const IMPORTED_KEYS_SQL: &str = "\
SELECT fa.attname, pn.nspname, pc.relname, pa.attname, k.ord
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_class pc ON pc.oid = con.confrelid
JOIN pg_namespace pn ON pn.oid = pc.relnamespace
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(fk_attnum, pk_attnum, ord)
JOIN pg_attribute fa ON fa.attrelid = con.conrelid AND fa.attnum = k.fk_attnum
JOIN pg_attribute pa ON pa.attrelid = con.confrelid AND pa.attnum = k.pk_attnum
WHERE con.contype = 'f'
  AND c.relname = $1
  AND (($2::text IS NULL AND pg_table_is_visible(c.oid)) OR n.nspname = $2)
ORDER BY pn.nspname, pc.relname, con.conname, k.ord";

/// PostgreSQL driver
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }

    /// Build the tokio-postgres config for a connection
    pub fn parse_config(params: &ConnectionParams) -> Result<PgConfig, DriverError> {
        let url = params.url.strip_prefix("jdbc:").unwrap_or(&params.url);

        let mut config: PgConfig = url.parse()
            .map_err(|e| DriverError::ConfigError(format!(
                "Invalid connection URL: {}", e
            )))?;

        if let Some(user) = &params.username {
            config.user(user);
        }
        if let Some(password) = &params.password {
            config.password(password);
        }
        config.application_name("sqlbridge");

        Ok(config)
    }

    /// Convert a PostgreSQL type name to a [`SqlType`]
    ///
    /// Accepts both internal names (`int4`, `bpchar`) and SQL names
    /// (`integer`, `character varying(20)`).
    pub fn map_postgres_type(pg_type: &str) -> SqlType {
        let base_type = pg_type.split('(').next()
            .unwrap_or(pg_type)
            .trim()
            .to_lowercase();

        match base_type.as_str() {
            "boolean" | "bool" => SqlType::Boolean,

            "smallint" | "int2" | "smallserial" | "serial2" => SqlType::SmallInt,
            "integer" | "int" | "int4" | "serial" | "serial4" => SqlType::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => SqlType::BigInt,

            "real" | "float4" => SqlType::Real,
            "double precision" | "float8" => SqlType::Double,
            "float" => SqlType::Float,
            "numeric" => SqlType::Numeric,
            "decimal" => SqlType::Decimal,

            "character" | "char" | "bpchar" => SqlType::Char,
            "character varying" | "varchar" | "text" | "name" | "citext" => SqlType::Varchar,

            "bytea" => SqlType::Binary,

            "date" => SqlType::Date,
            "timestamp without time zone" | "timestamp"
            | "timestamp with time zone" | "timestamptz" => SqlType::Timestamp,
            "time without time zone" | "time" => SqlType::Time,

            _ => SqlType::Other(base_type),
        }
    }
}

/// Types [`decode_value`] reads from the binary protocol
fn decodes_natively(pg_type: &Type) -> bool {
    matches!(
        *pg_type,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::OID
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::NUMERIC
            | Type::DATE
            | Type::TIME
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::BYTEA
            | Type::JSON
            | Type::JSONB
            | Type::UUID
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
    )
}

/// Rewrite `query` so that columns without native decoding come back as text
///
/// Columns are renamed positionally, which keeps duplicate and unnamed
/// result columns apart. Returns `None` when no column needs a cast.
fn text_projection(query: &str, types: &[Type]) -> Option<String> {
    if types.iter().all(decodes_natively) {
        return None;
    }

    let aliases: Vec<String> = (1..=types.len()).map(|i| format!("c{}", i)).collect();
    let select = types
        .iter()
        .zip(&aliases)
        .map(|(pg_type, alias)| {
            if decodes_natively(pg_type) {
                alias.clone()
            } else {
                format!("{}::text", alias)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!(
        "SELECT {} FROM ({}) AS {}({})",
        select,
        query,
        PROJECTION_ALIAS,
        aliases.join(", ")
    ))
}

fn spawn_connection<F>(connection: F, host: String) -> JoinHandle<()>
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(host = %host, error = %e, "PostgreSQL connection error");
        }
    })
}

#[async_trait::async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["postgresql", "org.postgresql.Driver"]
    }

    fn accepts_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        ["postgres://", "postgresql://", "jdbc:postgresql://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, DriverError> {
        let config = Self::parse_config(params)?;

        let host = config.get_hosts()
            .first()
            .map(|h| format!("{:?}", h))
            .unwrap_or_else(|| "localhost".to_string());

        let (client, task) = if params.tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| DriverError::ConfigError(format!(
                    "Failed to create TLS connector: {}", e
                )))?;

            let (client, connection) = config.connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| DriverError::connection_caused_by(
                    format!("cannot connect to PostgreSQL at {} with TLS", host),
                    e,
                ))?;
            (client, spawn_connection(connection, host))
        } else {
            let (client, connection) = config.connect(NoTls)
                .await
                .map_err(|e| DriverError::connection_caused_by(
                    format!("cannot connect to PostgreSQL at {}", host),
                    e,
                ))?;
            (client, spawn_connection(connection, host))
        };

        Ok(Box::new(PgConnection { client, task }))
    }
}

struct PgConnection {
    client: Client,
    task: JoinHandle<()>,
}

impl PgConnection {
    /// Describe result columns, resolving source tables from the catalog
    async fn describe(&self, statement: &Statement) -> Result<Vec<ColumnDescriptor>, DriverError> {
        let oids: Vec<u32> = statement.columns()
            .iter()
            .filter_map(|c| c.table_oid())
            .collect();

        let mut sources: HashMap<(u32, i16), (TableRef, String)> = HashMap::new();
        if !oids.is_empty() {
            let rows = self.client.query(RESOLVE_COLUMNS_SQL, &[&oids])
                .await
                .map_err(|e| DriverError::metadata_caused_by("cannot resolve result columns", e))?;

            for row in rows {
                let oid: u32 = row.get(0);
                let schema: String = row.get(1);
                let table: String = row.get(2);
                let attnum: i16 = row.get(3);
                let attname: String = row.get(4);
                sources.insert((oid, attnum), (TableRef::new(table).with_schema(schema), attname));
            }
        }

        Ok(statement.columns()
            .iter()
            .map(|column| {
                let descriptor = ColumnDescriptor::new(
                    column.name(),
                    PostgresDriver::map_postgres_type(column.type_().name()),
                );
                let source = column.table_oid()
                    .zip(column.column_id())
                    .and_then(|key| sources.get(&key));

                match source {
                    Some((table, attname)) => descriptor
                        .with_name(attname.clone())
                        .with_table(table.clone()),
                    None => descriptor,
                }
            })
            .collect())
    }

    async fn rollback(&self) {
        if let Err(e) = self.client.batch_execute("ROLLBACK").await {
            tracing::warn!(error = %e, "Rollback failed");
        }
    }
}

#[async_trait::async_trait]
impl Connection for PgConnection {
    async fn open_cursor<'a>(
        &'a self,
        query: &str,
        fetch_size: FetchSize,
    ) -> Result<Box<dyn RowCursor + 'a>, DriverError> {
        let query = query.trim().trim_end_matches(';');

        let described = self.client.prepare(query)
            .await
            .map_err(|e| DriverError::query_caused_by("cannot prepare query", e))?;
        let columns = self.describe(&described).await?;

        let source_types: Vec<Type> = described.columns().iter().map(|c| c.type_().clone()).collect();
        let (query, statement) = match text_projection(query, &source_types) {
            Some(projected) => {
                tracing::debug!(query = %projected, "Reading undecodable columns as text");
                let statement = self.client.prepare(&projected)
                    .await
                    .map_err(|e| DriverError::query_caused_by("cannot prepare query", e))?;
                (projected, statement)
            }
            None => (query.to_string(), described),
        };
        let types = statement.columns().iter().map(|c| c.type_().clone()).collect();

        self.client.batch_execute("BEGIN READ ONLY")
            .await
            .map_err(|e| DriverError::query_caused_by("cannot start read-only transaction", e))?;

        let rows = match fetch_size.rows() {
            Some(n) => {
                let declared = self.client
                    .batch_execute(&format!("DECLARE {} NO SCROLL CURSOR FOR {}", CURSOR_NAME, query))
                    .await;
                let fetch = match declared {
                    Ok(()) => self.client
                        .prepare(&format!("FETCH FORWARD {} FROM {}", n, CURSOR_NAME))
                        .await,
                    Err(e) => Err(e),
                };

                match fetch {
                    Ok(fetch) => PgRows::Batched {
                        fetch,
                        batch: n as usize,
                        buffer: VecDeque::new(),
                        exhausted: false,
                    },
                    Err(e) => {
                        self.rollback().await;
                        return Err(DriverError::query_caused_by("cannot open cursor", e));
                    }
                }
            }
            None => match self.client.query_raw(&statement, Vec::<&(dyn ToSql + Sync)>::new()).await {
                Ok(stream) => PgRows::Streaming(Box::pin(stream)),
                Err(e) => {
                    self.rollback().await;
                    return Err(DriverError::query_caused_by("cannot execute query", e));
                }
            },
        };

        Ok(Box::new(PgCursor {
            connection: self,
            columns,
            types,
            rows,
        }))
    }

    async fn primary_keys(&self, table: &TableRef) -> Result<Vec<PrimaryKeyColumn>, DriverError> {
        let rows = self.client
            .query(PRIMARY_KEYS_SQL, &[&table.table, &table.schema])
            .await
            .map_err(|e| DriverError::metadata_caused_by(
                format!("cannot read primary keys of {}", table),
                e,
            ))?;

        Ok(rows.iter()
            .map(|row| PrimaryKeyColumn {
                column: row.get(0),
                key_seq: key_seq(row.get(1)),
            })
            .collect())
    }

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, DriverError> {
        let rows = self.client
            .query(IMPORTED_KEYS_SQL, &[&table.table, &table.schema])
            .await
            .map_err(|e| DriverError::metadata_caused_by(
                format!("cannot read imported keys of {}", table),
                e,
            ))?;

        Ok(rows.iter()
            .map(|row| ImportedKey {
                fk_column: row.get(0),
                pk_schema: row.get(1),
                pk_table: row.get(2),
                pk_column: row.get(3),
                key_seq: key_seq(row.get(4)),
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let PgConnection { client, task } = *self;
        drop(client);

        task.await
            .map_err(|e| DriverError::connection_caused_by("connection task did not finish", e))
    }
}

fn key_seq(ordinal: i64) -> u16 {
    u16::try_from(ordinal).unwrap_or(u16::MAX)
}

enum PgRows {
    /// Rows read `batch` at a time with FETCH FORWARD
    Batched {
        fetch: Statement,
        batch: usize,
        buffer: VecDeque<Row>,
        exhausted: bool,
    },

    /// Rows read one by one off the wire
    Streaming(Pin<Box<RowStream>>),
}

struct PgCursor<'a> {
    connection: &'a PgConnection,
    columns: Vec<ColumnDescriptor>,
    types: Vec<Type>,
    rows: PgRows,
}

#[async_trait::async_trait]
impl<'a> RowCursor for PgCursor<'a> {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<RawRow>, DriverError> {
        let row = match &mut self.rows {
            PgRows::Batched { fetch, batch, buffer, exhausted } => {
                if buffer.is_empty() && !*exhausted {
                    let rows = self.connection.client.query(&*fetch, &[])
                        .await
                        .map_err(|e| DriverError::query_caused_by("cannot fetch rows", e))?;
                    *exhausted = rows.len() < *batch;
                    buffer.extend(rows);
                }
                buffer.pop_front()
            }
            PgRows::Streaming(stream) => stream.try_next()
                .await
                .map_err(|e| DriverError::query_caused_by("cannot fetch rows", e))?,
        };

        row.map(|row| decode_row(&row, &self.columns, &self.types)).transpose()
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let PgCursor { connection, rows, .. } = *self;
        drop(rows);

        connection.client.batch_execute("ROLLBACK")
            .await
            .map_err(|e| DriverError::query_caused_by("cannot close cursor", e))
    }
}

fn decode_row(row: &Row, columns: &[ColumnDescriptor], types: &[Type]) -> Result<RawRow, DriverError> {
    columns.iter()
        .zip(types)
        .enumerate()
        .map(|(idx, (column, pg_type))| decode_value(row, idx, column, pg_type))
        .collect()
}

fn get<'r, T: FromSql<'r>>(
    row: &'r Row,
    idx: usize,
    column: &ColumnDescriptor,
    pg_type: &Type,
) -> Result<Option<T>, DriverError> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| DriverError::Decode {
        column: column.label.clone(),
        type_name: pg_type.name().to_string(),
        source: Box::new(e),
    })
}

fn decode_value(row: &Row, idx: usize, column: &ColumnDescriptor, pg_type: &Type) -> Result<RawValue, DriverError> {
    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx, column, pg_type)?.map(RawValue::Bool),
        Type::INT2 => get::<i16>(row, idx, column, pg_type)?.map(|v| RawValue::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx, column, pg_type)?.map(|v| RawValue::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx, column, pg_type)?.map(RawValue::Int),
        Type::OID => get::<u32>(row, idx, column, pg_type)?.map(|v| RawValue::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx, column, pg_type)?.map(|v| RawValue::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx, column, pg_type)?.map(RawValue::Float),
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx, column, pg_type)?.map(RawValue::Decimal),
        Type::DATE => get::<chrono::NaiveDate>(row, idx, column, pg_type)?.map(RawValue::Date),
        Type::TIME => get::<chrono::NaiveTime>(row, idx, column, pg_type)?.map(RawValue::Time),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx, column, pg_type)?.map(RawValue::Timestamp),
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>>(row, idx, column, pg_type)?.map(RawValue::TimestampTz)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx, column, pg_type)?.map(RawValue::Bytes),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, column, pg_type)?.map(RawValue::Json),
        Type::UUID => get::<uuid::Uuid>(row, idx, column, pg_type)?.map(RawValue::Uuid),
        _ => get::<String>(row, idx, column, pg_type)?.map(RawValue::Text),
    };

    Ok(value.unwrap_or(RawValue::Null))
}
