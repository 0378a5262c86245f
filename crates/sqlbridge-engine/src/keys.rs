//! Primary and foreign key detection

use sqlbridge_catalog::{ColumnDescriptor, Connection, DriverError};
use sqlbridge_core::{Column, LdmType, ReferenceTarget};

/// What key detection found for a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    /// Sole column of its table's primary key
    ConnectionPoint,

    /// Source column of a foreign key
    Reference(ReferenceTarget),

    /// Member of a multi-column primary key, role left unchanged
    CompositePrimaryKey { columns: Vec<String> },

    /// Not a key column, or its table is unknown
    None,
}

/// Annotates columns with key roles read from driver metadata
pub struct KeyResolver<'a> {
    connection: &'a dyn Connection,
}

impl<'a> KeyResolver<'a> {
    pub fn new(connection: &'a dyn Connection) -> Self {
        Self { connection }
    }

    /// Detect whether `column` is a key and update its role
    ///
    /// A sole primary key column becomes the connection point. Otherwise the
    /// table's foreign keys are scanned in driver order and the first one
    /// whose source column matches (case-insensitive) makes the column a
    /// reference. Metadata failures are returned as errors.
    pub async fn resolve(
        &self,
        column: &mut Column,
        descriptor: &ColumnDescriptor,
    ) -> Result<KeyResolution, DriverError> {
        let Some(table) = &descriptor.table else {
            tracing::debug!(column = %column.name, "No source table, skipping key detection");
            return Ok(KeyResolution::None);
        };

        let source_column = if descriptor.name.is_empty() {
            descriptor.label.as_str()
        } else {
            descriptor.name.as_str()
        };

        let mut resolution = KeyResolution::None;

        let primary_key = self.connection.primary_keys(table).await?;
        if primary_key.iter().any(|pk| pk.column.eq_ignore_ascii_case(source_column)) {
            if primary_key.len() == 1 {
                column.ldm_type = LdmType::ConnectionPoint;
                tracing::debug!(column = %column.name, table = %table, "Primary key column");
                return Ok(KeyResolution::ConnectionPoint);
            }

            let columns: Vec<String> = primary_key.into_iter().map(|pk| pk.column).collect();
            tracing::warn!(
                column = %column.name,
                table = %table,
                key = %columns.join(", "),
                "Composite primary keys are not supported as connection points"
            );
            resolution = KeyResolution::CompositePrimaryKey { columns };
        }

        let imported = self.connection.imported_keys(table).await?;
        if let Some(key) = imported
            .iter()
            .find(|key| key.fk_column.eq_ignore_ascii_case(source_column))
        {
            let target = ReferenceTarget::new(key.pk_table.clone(), key.pk_column.clone());
            tracing::debug!(column = %column.name, target = %target, "Foreign key column");
            column.set_reference(target.clone());
            return Ok(KeyResolution::Reference(target));
        }

        Ok(resolution)
    }
}
