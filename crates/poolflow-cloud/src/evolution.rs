//! Additive-only schema evolution
//!
//! A table schema may only gain new, nullable columns. Existing columns are
//! immutable once created and can never be removed.

use crate::error::SchemaEvolutionError;
use crate::model::{ColumnDescriptor, TableSchema};
use std::collections::BTreeMap;

/// Partition of two column sets, compared by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Columns only in the new set, in declaration order
    pub added: Vec<ColumnDescriptor>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
    /// Shared columns whose definition differs, with the first differing attribute
    pub modified: Vec<(String, &'static str)>,
}

impl SchemaDiff {
    pub fn is_additive(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compare two column sets by name
pub fn diff(old: &TableSchema, new: &TableSchema) -> SchemaDiff {
    let mut result = SchemaDiff::default();

    for column in old {
        match new.get(&column.name) {
            None => result.removed.push(column.name.clone()),
            Some(proposed) => match changed_attribute(column, proposed) {
                Some(attribute) => result.modified.push((column.name.clone(), attribute)),
                None => result.unchanged.push(column.name.clone()),
            },
        }
    }

    result.added = new
        .iter()
        .filter(|c| !old.contains(&c.name))
        .cloned()
        .collect();

    result
}

fn changed_attribute(old: &ColumnDescriptor, new: &ColumnDescriptor) -> Option<&'static str> {
    if old.column_type != new.column_type {
        Some("type")
    } else if old.nullable != new.nullable {
        Some("nullable")
    } else if old.json_path != new.json_path {
        Some("json path")
    } else {
        None
    }
}

/// Columns to add when moving from `old` to `new`
///
/// Rejects removals first, then in-place modifications, then required
/// additions; the error names the first offending column. `new` must
/// already be free of duplicate names.
pub fn plan_additions(
    old: &TableSchema,
    new: &TableSchema,
) -> Result<BTreeMap<String, ColumnDescriptor>, SchemaEvolutionError> {
    let diff = diff(old, new);

    if let Some(column) = diff.removed.into_iter().next() {
        return Err(SchemaEvolutionError::Removed { column });
    }

    if let Some((column, attribute)) = diff.modified.into_iter().next() {
        return Err(SchemaEvolutionError::Modified { column, attribute });
    }

    if let Some(column) = diff.added.iter().find(|c| !c.nullable) {
        return Err(SchemaEvolutionError::NotNullable {
            column: column.name.clone(),
        });
    }

    Ok(diff
        .added
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;

    fn col(name: &str, column_type: ColumnType, nullable: bool) -> ColumnDescriptor {
        ColumnDescriptor::new(name, column_type, nullable)
    }

    fn base() -> TableSchema {
        TableSchema::new(vec![
            col("A", ColumnType::String, false),
            col("B", ColumnType::Float, false),
        ])
    }

    #[test]
    fn test_superset_yields_exact_additions() {
        let new = TableSchema::new(vec![
            col("A", ColumnType::String, false),
            col("B", ColumnType::Float, false),
            col("C", ColumnType::Int64, true),
            col("D", ColumnType::Timestamp, true).with_json_path("meta.seen_at"),
        ]);

        let added = plan_additions(&base(), &new).unwrap();
        assert_eq!(added.keys().collect::<Vec<_>>(), vec!["C", "D"]);
        assert_eq!(added["D"].json_path.as_deref(), Some("meta.seen_at"));
    }

    #[test]
    fn test_identical_schema_adds_nothing() {
        let added = plan_additions(&base(), &base()).unwrap();
        assert!(added.is_empty());
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let new = TableSchema::new(vec![
            col("B", ColumnType::Float, false),
            col("A", ColumnType::String, false),
        ]);
        let d = diff(&base(), &new);
        assert!(d.is_additive());
        assert!(d.added.is_empty());
        assert_eq!(d.unchanged, vec!["A", "B"]);
    }

    #[test]
    fn test_required_new_column_rejected() {
        let new = TableSchema::new(vec![
            col("A", ColumnType::String, false),
            col("B", ColumnType::Float, false),
            col("C", ColumnType::Int64, false),
        ]);

        let err = plan_additions(&base(), &new).unwrap_err();
        assert_eq!(err.to_string(), "new column C must be nullable");
        assert_eq!(err.column(), "C");

        let new = TableSchema::new(vec![
            col("A", ColumnType::String, false),
            col("B", ColumnType::Float, false),
            col("C", ColumnType::Int64, true),
        ]);
        let added = plan_additions(&base(), &new).unwrap();
        assert_eq!(added.keys().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_removed_column_rejected() {
        let new = TableSchema::new(vec![col("A", ColumnType::String, false)]);

        let err = plan_additions(&base(), &new).unwrap_err();
        assert_eq!(
            err.to_string(),
            "column B was removed, column deletions are not supported"
        );
    }

    #[test]
    fn test_modified_column_rejected() {
        let cases = [
            (col("A", ColumnType::Int64, false), "type"),
            (col("A", ColumnType::String, true), "nullable"),
            (
                col("A", ColumnType::String, false).with_json_path("a"),
                "json path",
            ),
        ];

        for (changed, attribute) in cases {
            let new = TableSchema::new(vec![changed, col("B", ColumnType::Float, false)]);
            let err = plan_additions(&base(), &new).unwrap_err();
            assert_eq!(
                err,
                SchemaEvolutionError::Modified {
                    column: "A".to_string(),
                    attribute,
                }
            );
            assert!(err.to_string().starts_with(
                "column A was modified, column modifications are not supported"
            ));
        }
    }

    #[test]
    fn test_removal_reported_before_invalid_addition() {
        let new = TableSchema::new(vec![
            col("A", ColumnType::String, false),
            col("C", ColumnType::Int64, false),
        ]);

        let err = plan_additions(&base(), &new).unwrap_err();
        assert_eq!(
            err,
            SchemaEvolutionError::Removed {
                column: "B".to_string()
            }
        );
    }
}
