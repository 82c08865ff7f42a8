//! Column descriptors and ordered table schemas

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Column type accepted by the remote platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Boolean,
    Date,
    Double,
    Float,
    Int8,
    Int16,
    Int32,
    Int64,
    String,
    Timestamp,
}

impl ColumnType {
    pub const ALL: [ColumnType; 10] = [
        ColumnType::Boolean,
        ColumnType::Date,
        ColumnType::Double,
        ColumnType::Float,
        ColumnType::Int8,
        ColumnType::Int16,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::String,
        ColumnType::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Double => "DOUBLE",
            ColumnType::Float => "FLOAT",
            ColumnType::Int8 => "INT8",
            ColumnType::Int16 => "INT16",
            ColumnType::Int32 => "INT32",
            ColumnType::Int64 => "INT64",
            ColumnType::String => "STRING",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "column type",
                value: s.to_string(),
            })
    }
}

/// A single column of a table schema
///
/// Field names follow the wire shape so the descriptor doubles as the
/// operation input for column-bearing mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    #[serde(rename = "columnName")]
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(rename = "isNullable", default)]
    pub nullable: bool,

    /// JSON path for columns extracted from semi-structured payloads
    #[serde(
        rename = "jsonProperty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub json_path: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
            json_path: None,
        }
    }

    pub fn with_json_path(mut self, path: impl Into<String>) -> Self {
        self.json_path = Some(path.into());
        self
    }
}

/// Ordered column set; names are unique within one schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema(Vec<ColumnDescriptor>);

impl TableSchema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self(columns)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn push(&mut self, column: ColumnDescriptor) {
        self.0.push(column);
    }

    /// Reject duplicate column names, reporting the first repeated name
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::with_capacity(self.0.len());
        for column in &self.0 {
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(())
    }
}

impl From<Vec<ColumnDescriptor>> for TableSchema {
    fn from(columns: Vec<ColumnDescriptor>) -> Self {
        Self(columns)
    }
}

impl FromIterator<ColumnDescriptor> for TableSchema {
    fn from_iter<I: IntoIterator<Item = ColumnDescriptor>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TableSchema {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_parse() {
        assert_eq!("INT64".parse::<ColumnType>().unwrap(), ColumnType::Int64);
        assert_eq!(
            "TIMESTAMP".parse::<ColumnType>().unwrap(),
            ColumnType::Timestamp
        );

        let err = "DECIMAL".parse::<ColumnType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown column type value: DECIMAL");
        assert!("int64".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = TableSchema::new(vec![
            ColumnDescriptor::new("A", ColumnType::String, false),
            ColumnDescriptor::new("B", ColumnType::Float, true),
            ColumnDescriptor::new("A", ColumnType::Int64, true),
        ]);

        let err = schema.validate().unwrap_err();
        assert_eq!(err.to_string(), "column A already exists");
    }

    #[test]
    fn test_column_wire_shape() {
        let column = ColumnDescriptor::new("account_id", ColumnType::String, true)
            .with_json_path("account.id");
        let json = serde_json::to_value(&column).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "columnName": "account_id",
                "type": "STRING",
                "isNullable": true,
                "jsonProperty": "account.id"
            })
        );
    }
}
