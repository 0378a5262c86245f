//! Schema definition artifact
//!
//! A [`Schema`] is the ordered list of columns produced by inference and
//! consumed (read-only) by extraction. Column order is positional: it must
//! match the result-set column order of the extraction query.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Analytical role of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LdmType {
    /// Descriptive value, grouped and filtered on
    Attribute,

    /// Numeric measure, aggregated
    Fact,

    /// Calendar date
    Date,

    /// Single column identifying each record of the dataset
    ConnectionPoint,

    /// Value identifying a record in another dataset
    Reference,
}

impl std::fmt::Display for LdmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attribute => write!(f, "ATTRIBUTE"),
            Self::Fact => write!(f, "FACT"),
            Self::Date => write!(f, "DATE"),
            Self::ConnectionPoint => write!(f, "CONNECTION_POINT"),
            Self::Reference => write!(f, "REFERENCE"),
        }
    }
}

/// Target of a reference column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceTarget {
    /// Referenced table (dataset)
    pub table: String,

    /// Referenced column
    pub column: String,
}

impl ReferenceTarget {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A column of the schema definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Normalized identifier
    pub name: String,

    /// Analytical role
    pub ldm_type: LdmType,

    /// Human readable description (the original column label)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Date format pattern, present iff `ldm_type` is `Date`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    /// Referenced table and column, present iff `ldm_type` is `Reference`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceTarget>,

    /// Shared date dimension this column should join
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_hint: Option<String>,
}

impl Column {
    /// Create a new column with no format, reference or hint
    pub fn new(name: impl Into<String>, ldm_type: LdmType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ldm_type,
            description: description.into(),
            date_format: None,
            reference: None,
            dimension_hint: None,
        }
    }

    /// Set the date format
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Turn this column into a reference to `target`
    pub fn set_reference(&mut self, target: ReferenceTarget) {
        self.ldm_type = LdmType::Reference;
        self.reference = Some(target);
    }

    pub fn is_connection_point(&self) -> bool {
        self.ldm_type == LdmType::ConnectionPoint
    }

    /// Check the per-column invariants
    pub fn validate(&self) -> Result<(), SchemaError> {
        match (self.ldm_type, &self.reference) {
            (LdmType::Reference, None) => {
                return Err(SchemaError::MissingReferenceTarget(self.name.clone()))
            }
            (t, Some(_)) if t != LdmType::Reference => {
                return Err(SchemaError::UnexpectedReferenceTarget(self.name.clone()))
            }
            _ => {}
        }

        match (self.ldm_type, &self.date_format) {
            (LdmType::Date, None) => Err(SchemaError::MissingDateFormat(self.name.clone())),
            (t, Some(_)) if t != LdmType::Date => {
                Err(SchemaError::UnexpectedDateFormat(self.name.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// A named, ordered collection of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Dataset name
    pub name: String,

    /// Ordered list of columns
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Create a schema from columns
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Append a column
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The connection point column, if any
    pub fn connection_point(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_connection_point())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check column invariants, name uniqueness and the single connection point
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut names = HashSet::new();
        let mut connection_point: Option<&str> = None;

        for column in &self.columns {
            column.validate()?;

            if !names.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }

            if column.is_connection_point() {
                if let Some(first) = connection_point {
                    return Err(SchemaError::MultipleConnectionPoints {
                        first: first.to_string(),
                        second: column.name.clone(),
                    });
                }
                connection_point = Some(&column.name);
            }
        }

        Ok(())
    }

    /// Load and validate a schema from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::IoError(format!("{}: {}", path.display(), e)))?;

        let schema: Schema = serde_json::from_str(&contents)
            .map_err(|e| SchemaError::ParseError(e.to_string()))?;

        schema.validate()?;
        Ok(schema)
    }

    /// Save the schema as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), SchemaError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SchemaError::SerializeError(e.to_string()))?;

        std::fs::write(path, json)
            .map_err(|e| SchemaError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }
}

/// Schema error types
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Column '{0}' is a REFERENCE but has no reference target")]
    MissingReferenceTarget(String),

    #[error("Column '{0}' has a reference target but is not a REFERENCE")]
    UnexpectedReferenceTarget(String),

    #[error("Column '{0}' is a DATE but has no date format")]
    MissingDateFormat(String),

    #[error("Column '{0}' has a date format but is not a DATE")]
    UnexpectedDateFormat(String),

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Only one CONNECTION_POINT is allowed, found '{first}' and '{second}'")]
    MultipleConnectionPoints { first: String, second: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn orders() -> Schema {
        let mut customer = Column::new("customer_id", LdmType::Attribute, "customer_id");
        customer.set_reference(ReferenceTarget::new("customers", "id"));

        Schema::from_columns(
            "orders",
            vec![
                Column::new("id", LdmType::ConnectionPoint, "id"),
                customer,
                Column::new("amount", LdmType::Fact, "amount"),
                Column::new("created_at", LdmType::Date, "created_at").with_date_format("yyyy-MM-dd"),
            ],
        )
    }

    #[test]
    fn ldm_type_display() {
        assert_eq!(LdmType::ConnectionPoint.to_string(), "CONNECTION_POINT");
        assert_eq!(LdmType::Fact.to_string(), "FACT");
    }

    #[test]
    fn schema_operations() {
        let schema = orders();

        assert_eq!(schema.column_names(), vec!["id", "customer_id", "amount", "created_at"]);
        assert_eq!(schema.connection_point().map(|c| c.name.as_str()), Some("id"));
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn set_reference_changes_role() {
        let mut column = Column::new("customer_id", LdmType::Attribute, "");
        column.set_reference(ReferenceTarget::new("customers", "id"));

        assert_eq!(column.ldm_type, LdmType::Reference);
        assert_eq!(column.reference.as_ref().map(|r| r.to_string()), Some("customers.id".to_string()));
    }

    #[test]
    fn reference_target_requires_reference_role() {
        let mut column = Column::new("customer_id", LdmType::Attribute, "");
        column.reference = Some(ReferenceTarget::new("customers", "id"));

        assert!(matches!(column.validate(), Err(SchemaError::UnexpectedReferenceTarget(_))));

        let column = Column::new("customer_id", LdmType::Reference, "");
        assert!(matches!(column.validate(), Err(SchemaError::MissingReferenceTarget(_))));
    }

    #[test]
    fn date_format_requires_date_role() {
        let column = Column::new("created_at", LdmType::Date, "");
        assert!(matches!(column.validate(), Err(SchemaError::MissingDateFormat(_))));

        let column = Column::new("amount", LdmType::Fact, "").with_date_format("yyyy-MM-dd");
        assert!(matches!(column.validate(), Err(SchemaError::UnexpectedDateFormat(_))));
    }

    #[test]
    fn at_most_one_connection_point() {
        let schema = Schema::from_columns(
            "bad",
            vec![
                Column::new("a", LdmType::ConnectionPoint, ""),
                Column::new("b", LdmType::ConnectionPoint, ""),
            ],
        );

        match schema.validate() {
            Err(SchemaError::MultipleConnectionPoints { first, second }) => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("Expected MultipleConnectionPoints, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let schema = Schema::from_columns(
            "dup",
            vec![
                Column::new("a", LdmType::Attribute, ""),
                Column::new("a", LdmType::Fact, ""),
            ],
        );
        assert!(matches!(schema.validate(), Err(SchemaError::DuplicateColumn(_))));
    }

    #[test]
    fn file_roundtrip_preserves_order_and_optionals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let schema = orders();

        schema.save_to_file(&path).unwrap();
        let loaded = Schema::from_file(&path).unwrap();

        assert_eq!(loaded, schema);
    }

    #[test]
    fn from_file_rejects_invalid_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"name":"bad","columns":[{"name":"d","ldm_type":"DATE"}]}"#,
        )
        .unwrap();

        assert!(matches!(Schema::from_file(&path), Err(SchemaError::MissingDateFormat(_))));
    }

    #[test]
    fn serialized_role_names() {
        let json = serde_json::to_string(&LdmType::ConnectionPoint).unwrap();
        assert_eq!(json, "\"CONNECTION_POINT\"");
    }
}
