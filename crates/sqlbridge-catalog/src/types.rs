//! Driver-reported column types and row values

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Column type code reported by a driver
///
/// Numeric codes follow the ISO/ODBC SQL type codes, so drivers that only
/// report an integer can use [`SqlType::from_code`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Char,
    Varchar,
    SmallInt,
    Integer,
    BigInt,
    /// Single precision float
    Real,
    /// Float of driver-defined precision
    Float,
    /// Double precision float
    Double,
    Decimal,
    Numeric,
    Date,
    Time,
    Timestamp,
    Boolean,
    Binary,

    /// Anything else, carrying the driver's type name
    Other(String),
}

impl SqlType {
    /// Map an ISO/ODBC SQL type code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 | -15 => Self::Char,
            12 | -1 | -9 | -16 => Self::Varchar,
            5 | -6 => Self::SmallInt,
            4 => Self::Integer,
            -5 => Self::BigInt,
            7 => Self::Real,
            6 => Self::Float,
            8 => Self::Double,
            3 => Self::Decimal,
            2 => Self::Numeric,
            91 => Self::Date,
            92 => Self::Time,
            93 => Self::Timestamp,
            16 | -7 => Self::Boolean,
            -2 | -3 | -4 => Self::Binary,
            other => Self::Other(format!("code {}", other)),
        }
    }

    /// Whether values of this type carry a calendar date
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char => write!(f, "CHAR"),
            Self::Varchar => write!(f, "VARCHAR"),
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Real => write!(f, "REAL"),
            Self::Float => write!(f, "FLOAT"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::Numeric => write!(f, "NUMERIC"),
            Self::Date => write!(f, "DATE"),
            Self::Time => write!(f, "TIME"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Binary => write!(f, "BINARY"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A driver-native cell value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
}

/// One fetched row, one value per result column
pub type RawRow = Vec<RawValue>;

impl RawValue {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as a point in time, for date and timestamp values
    ///
    /// Dates map to midnight; zoned timestamps are converted to UTC.
    pub fn as_naive_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(d) => d.and_hms_opt(0, 0, 0),
            Self::Timestamp(ts) => Some(*ts),
            Self::TimestampTz(ts) => Some(ts.naive_utc()),
            _ => None,
        }
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{}", s),
            Self::Bytes(b) => write!(f, "{}", hex::encode(b)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::TimestampTz(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Json(v) => write!(f, "{}", v),
            Self::Uuid(u) => write!(f, "{}", u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn type_codes() {
        assert_eq!(SqlType::from_code(1), SqlType::Char);
        assert_eq!(SqlType::from_code(12), SqlType::Varchar);
        assert_eq!(SqlType::from_code(4), SqlType::Integer);
        assert_eq!(SqlType::from_code(-5), SqlType::BigInt);
        assert_eq!(SqlType::from_code(8), SqlType::Double);
        assert_eq!(SqlType::from_code(3), SqlType::Decimal);
        assert_eq!(SqlType::from_code(91), SqlType::Date);
        assert_eq!(SqlType::from_code(93), SqlType::Timestamp);
        assert_eq!(SqlType::from_code(1111), SqlType::Other("code 1111".to_string()));
    }

    #[test]
    fn value_text_rendering() {
        assert_eq!(RawValue::Null.to_string(), "");
        assert_eq!(RawValue::Int(42).to_string(), "42");
        assert_eq!(RawValue::Float(99.5).to_string(), "99.5");
        assert_eq!(RawValue::Decimal(Decimal::from_str("99.50").unwrap()).to_string(), "99.50");
        assert_eq!(RawValue::Bytes(vec![0xca, 0xfe]).to_string(), "cafe");
        assert_eq!(RawValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn uuid_and_json_values() {
        let id = uuid::Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(RawValue::Uuid(id).to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(RawValue::Json(serde_json::json!({"a": 1})).to_string(), r#"{"a":1}"#);
        assert_ne!(RawValue::Uuid(id), RawValue::Text(id.to_string()));
    }

    #[test]
    fn temporal_values_as_datetime() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();

        assert_eq!(RawValue::Date(date).as_naive_datetime(), Some(midnight));
        assert_eq!(RawValue::Timestamp(midnight).as_naive_datetime(), Some(midnight));
        assert_eq!(RawValue::Text("2020-01-01".into()).as_naive_datetime(), None);
    }
}
