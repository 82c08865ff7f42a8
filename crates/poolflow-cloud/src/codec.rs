//! Field codec helpers shared by every resource type
//!
//! Per-type encode/decode functions live next to their types in
//! [`crate::resources`]; the pieces they have in common live here.

use crate::change::ChangeSet;
use crate::error::CodecError;
use crate::model::{
    ColumnDescriptor, ColumnType, ConnectionSettings, Filter, FilterOperator, TableSchema,
};
use serde::{Deserialize, Serialize, Serializer};

/// Reference to an existing entity by identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Paginated list wrapper used by connection fields
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// Reference to a column by name, as used for timestamp and tenant keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub column_name: String,
}

impl ColumnRef {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
        }
    }
}

/// Column as reported by the server; the type is an open string there
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteColumn {
    pub column_name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub json_property: Option<String>,
}

/// Parse server columns, failing on a type this client does not know
pub fn decode_columns(remote: &[RemoteColumn]) -> Result<TableSchema, CodecError> {
    remote
        .iter()
        .map(|c| {
            let column_type: ColumnType =
                c.column_type
                    .parse()
                    .map_err(|_| CodecError::UnknownValue {
                        field: "column type",
                        value: c.column_type.clone(),
                    })?;
            Ok(ColumnDescriptor {
                name: c.column_name.clone(),
                column_type,
                nullable: c.is_nullable,
                json_path: c.json_property.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFilter {
    pub column: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Parse server filters, failing on an operator this client does not know
pub fn decode_filters(remote: &[RemoteFilter]) -> Result<Vec<Filter>, CodecError> {
    remote
        .iter()
        .map(|f| {
            let operator: FilterOperator =
                f.operator.parse().map_err(|_| CodecError::UnknownValue {
                    field: "filter operator",
                    value: f.operator.clone(),
                })?;
            Ok(Filter {
                column: f.column.clone(),
                operator,
                value: f.value.clone(),
            })
        })
        .collect()
}

/// `value` when `field` is in the change set
pub fn if_changed<F: Copy + Ord, T: Clone>(
    changes: &ChangeSet<F>,
    field: F,
    value: &T,
) -> Option<T> {
    changes.has_changed(field).then(|| value.clone())
}

/// Like [`if_changed`] for optional text, sending an empty string to clear it
pub fn text_if_changed<F: Copy + Ord>(
    changes: &ChangeSet<F>,
    field: F,
    value: &Option<String>,
) -> Option<String> {
    changes
        .has_changed(field)
        .then(|| value.clone().unwrap_or_default())
}

/// Remote descriptions come back as empty strings when unset
pub fn optional_text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Secret the server never echoes: keep the last-known local value
pub fn carry_secret(local: Option<&str>) -> String {
    local.map(str::to_string).unwrap_or_default()
}

/// Serialize settings as the bare variant body the mutations expect
pub fn settings_wire<S: Serializer>(
    settings: &ConnectionSettings,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match settings {
        ConnectionSettings::Snowflake(s) => s.serialize(serializer),
        ConnectionSettings::S3(s) => s.serialize(serializer),
        ConnectionSettings::Http(s) => s.serialize(serializer),
        ConnectionSettings::Kafka(s) => s.serialize(serializer),
        ConnectionSettings::Webhook(s) => s.serialize(serializer),
        ConnectionSettings::ClickHouse(s) => s.serialize(serializer),
    }
}

pub fn settings_wire_opt<S: Serializer>(
    settings: &Option<ConnectionSettings>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match settings {
        Some(settings) => settings_wire(settings, serializer),
        None => serializer.serialize_none(),
    }
}
