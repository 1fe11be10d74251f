//! Table references and schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::DataType;

/// A schema-qualified table name, e.g. `bronze.events`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (layer) the table belongs to.
    pub schema: String,
    /// Table name within the schema.
    pub name: String,
}

impl TableRef {
    /// Creates a new table reference.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the fully qualified `schema.name` form.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A named, typed column.
///
/// All columns are nullable; non-null requirements are enforced by the
/// cleaning layer, not the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
}

/// An ordered list of columns describing a table's shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns in declaration order.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Creates a new empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column and returns the schema, for fluent construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the schema contains a column with the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ref_displays_qualified() {
        let table = TableRef::new("silver", "events_cleaned");
        assert_eq!(table.to_string(), "silver.events_cleaned");
        assert_eq!(table.qualified(), "silver.events_cleaned");
    }

    #[test]
    fn schema_builder_preserves_declaration_order() {
        let schema = TableSchema::new()
            .with("event_id", DataType::Int64)
            .with("user_id", DataType::String)
            .with("ingested_at", DataType::Timestamp);

        assert_eq!(
            schema.column_names(),
            vec!["event_id", "user_id", "ingested_at"]
        );
        assert_eq!(
            schema.column("user_id").map(|c| c.data_type),
            Some(DataType::String)
        );
        assert!(!schema.contains("unknown"));
    }

    #[test]
    fn schema_serializes_for_sidecar_files() {
        let schema = TableSchema::new().with("event_id", DataType::Int64);
        let json = serde_json::to_string(&schema).unwrap();
        let back: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
        assert!(json.contains("int64"));
    }
}
