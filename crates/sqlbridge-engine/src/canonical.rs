//! Canonical row representation
//!
//! Every fetched row is normalized before it reaches a transformer: nulls
//! become empty text, dates and timestamps become a single timestamp type,
//! and every other value becomes its text rendering.

use chrono::{NaiveDate, NaiveDateTime};
use sqlbridge_catalog::{ColumnDescriptor, DriverError, RawRow, RawValue, RowCursor};

/// A normalized cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    Text(String),
    Timestamp(NaiveDateTime),
}

impl CanonicalValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// One normalized row, one value per result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow(pub Vec<CanonicalValue>);

impl CanonicalRow {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[CanonicalValue] {
        &self.0
    }

    /// Plain text rendering of every cell
    pub fn to_text(&self) -> Vec<String> {
        self.0.iter().map(|v| v.to_string()).collect()
    }
}

/// Normalize a driver row
///
/// Values of date and timestamp columns that arrive as text are parsed when
/// they look like `YYYY-MM-DD[ HH:MM:SS[.fff]]`, and kept as text otherwise.
pub fn canonicalize(raw: RawRow, columns: &[ColumnDescriptor]) -> CanonicalRow {
    CanonicalRow(
        raw.into_iter()
            .enumerate()
            .map(|(idx, value)| {
                let temporal = columns.get(idx).is_some_and(|c| c.sql_type.is_temporal());
                canonical_value(value, temporal)
            })
            .collect(),
    )
}

fn canonical_value(value: RawValue, temporal: bool) -> CanonicalValue {
    if value.is_null() {
        return CanonicalValue::empty();
    }

    if let Some(ts) = value.as_naive_datetime() {
        return CanonicalValue::Timestamp(ts);
    }

    if let (true, RawValue::Text(text)) = (temporal, &value) {
        if let Some(ts) = parse_timestamp(text) {
            return CanonicalValue::Timestamp(ts);
        }
    }

    CanonicalValue::Text(value.to_string())
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Lazy, single-pass sequence of canonical rows read from a cursor
///
/// Only the current row is held; nothing is kept once it is returned.
pub struct CanonicalRows<'c> {
    cursor: &'c mut dyn RowCursor,
}

impl<'c> CanonicalRows<'c> {
    pub fn new(cursor: &'c mut dyn RowCursor) -> Self {
        Self { cursor }
    }

    /// The next canonical row, or `None` once the cursor is exhausted
    pub async fn next(&mut self) -> Result<Option<CanonicalRow>, DriverError> {
        let raw = self.cursor.next_row().await?;
        Ok(raw.map(|row| canonicalize(row, self.cursor.columns())))
    }
}
