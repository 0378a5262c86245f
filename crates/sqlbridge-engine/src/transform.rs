//! Row transformers
//!
//! A transformer turns a [`CanonicalRow`] into the output row written to the
//! sink, using the schema positionally: value `i` belongs to column `i`.

use crate::canonical::{CanonicalRow, CanonicalValue};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlbridge_core::{to_chrono_pattern, Column, LdmType, Schema, DEFAULT_DATETIME_FORMAT};
use std::fmt::Write;
use std::str::FromStr;

/// Transform error types
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Row has {actual} values but the schema has {expected} columns")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Cannot render column '{column}' with format '{format}'")]
    InvalidFormat { column: String, format: String },
}

/// Reshapes canonical rows according to a schema
pub trait RowTransformer: Send + Sync {
    /// Header row written once before the data rows
    fn header(&self, schema: &Schema) -> Vec<String> {
        schema.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Output row for one canonical row
    fn transform(&self, row: &CanonicalRow, schema: &Schema) -> Result<Vec<String>, TransformError>;
}

fn check_width(row: &CanonicalRow, schema: &Schema) -> Result<(), TransformError> {
    if row.len() != schema.len() {
        return Err(TransformError::ColumnCountMismatch {
            expected: schema.len(),
            actual: row.len(),
        });
    }
    Ok(())
}

/// Default transformer for warehouse loads
///
/// - Fact cells are numerically normalized (`99.50` becomes `99.5`)
/// - Timestamps in columns with a date format are rendered with that format
/// - Other timestamps use the datetime format
/// - Everything else is copied as is
#[derive(Debug, Clone)]
pub struct LdmTransformer {
    datetime_format: String,
}

impl LdmTransformer {
    /// Create a transformer rendering plain timestamps with `datetime_format`
    pub fn new(datetime_format: impl Into<String>) -> Self {
        Self {
            datetime_format: datetime_format.into(),
        }
    }

    fn render_timestamp(&self, ts: &NaiveDateTime, column: &Column) -> Result<String, TransformError> {
        let format = column.date_format.as_deref().unwrap_or(&self.datetime_format);
        let mut out = String::new();

        write!(out, "{}", ts.format(&to_chrono_pattern(format))).map_err(|_| {
            TransformError::InvalidFormat {
                column: column.name.clone(),
                format: format.to_string(),
            }
        })?;

        Ok(out)
    }
}

impl Default for LdmTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_DATETIME_FORMAT)
    }
}

impl RowTransformer for LdmTransformer {
    fn transform(&self, row: &CanonicalRow, schema: &Schema) -> Result<Vec<String>, TransformError> {
        check_width(row, schema)?;

        row.values()
            .iter()
            .zip(&schema.columns)
            .map(|(value, column)| match value {
                CanonicalValue::Timestamp(ts) => self.render_timestamp(ts, column),
                CanonicalValue::Text(text) if column.ldm_type == LdmType::Fact => {
                    Ok(normalize_number(text))
                }
                CanonicalValue::Text(text) => Ok(text.clone()),
            })
            .collect()
    }
}

/// Canonical decimal rendering, or the input when it is not a number
fn normalize_number(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|_| text.to_string())
}

/// Writes canonical values without reshaping (dump mode)
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

impl RowTransformer for PassthroughTransformer {
    fn transform(&self, row: &CanonicalRow, schema: &Schema) -> Result<Vec<String>, TransformError> {
        check_width(row, schema)?;
        Ok(row.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlbridge_core::{ReferenceTarget, DEFAULT_DATE_FORMAT};

    fn orders_schema() -> Schema {
        let mut customer = Column::new("customer_id", LdmType::Attribute, "customer_id");
        customer.set_reference(ReferenceTarget::new("CUSTOMERS", "id"));

        Schema::from_columns(
            "orders",
            vec![
                Column::new("id", LdmType::ConnectionPoint, "id"),
                customer,
                Column::new("amount", LdmType::Fact, "amount"),
                Column::new("created_at", LdmType::Date, "created_at")
                    .with_date_format(DEFAULT_DATE_FORMAT),
            ],
        )
    }

    fn order_row(amount: &str) -> CanonicalRow {
        let created = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        CanonicalRow(vec![
            CanonicalValue::Text("1".into()),
            CanonicalValue::Text("10".into()),
            CanonicalValue::Text(amount.into()),
            CanonicalValue::Timestamp(created),
        ])
    }

    #[test]
    fn test_header_from_schema() {
        assert_eq!(
            LdmTransformer::default().header(&orders_schema()),
            vec!["id", "customer_id", "amount", "created_at"]
        );
    }

    #[test]
    fn test_ldm_transform() {
        let out = LdmTransformer::default()
            .transform(&order_row("99.50"), &orders_schema())
            .unwrap();
        assert_eq!(out, vec!["1", "10", "99.5", "2020-01-01"]);
    }

    #[test]
    fn test_fact_normalization() {
        assert_eq!(normalize_number("99.50"), "99.5");
        assert_eq!(normalize_number("100"), "100");
        assert_eq!(normalize_number("0.000"), "0");
        assert_eq!(normalize_number("-1.2500"), "-1.25");
        assert_eq!(normalize_number("1.5e3"), "1500");
        assert_eq!(normalize_number(""), "");
        assert_eq!(normalize_number("n/a"), "n/a");
    }

    #[test]
    fn test_custom_date_format() {
        let mut schema = orders_schema();
        schema.columns[3].date_format = Some("dd.MM.yyyy".to_string());

        let out = LdmTransformer::default().transform(&order_row("1"), &schema).unwrap();
        assert_eq!(out[3], "01.01.2020");
    }

    #[test]
    fn test_timestamp_outside_date_column() {
        let schema = Schema::from_columns("events", vec![Column::new("seen", LdmType::Attribute, "seen")]);
        let ts = NaiveDate::from_ymd_opt(2021, 6, 30).unwrap().and_hms_opt(13, 5, 9).unwrap();
        let row = CanonicalRow(vec![CanonicalValue::Timestamp(ts)]);

        let out = LdmTransformer::default().transform(&row, &schema).unwrap();
        assert_eq!(out, vec!["2021-06-30 13:05:09"]);
    }

    #[test]
    fn test_width_mismatch() {
        let row = CanonicalRow(vec![CanonicalValue::empty()]);
        match LdmTransformer::default().transform(&row, &orders_schema()) {
            Err(TransformError::ColumnCountMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected ColumnCountMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_passthrough_keeps_text() {
        let out = PassthroughTransformer
            .transform(&order_row("99.50"), &orders_schema())
            .unwrap();
        assert_eq!(out, vec!["1", "10", "99.50", "2020-01-01 00:00:00"]);
    }
}
