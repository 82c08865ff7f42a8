//! Data pools: columnar tables that store ingested data

use crate::change::{ChangeSet, Desired};
use crate::codec::{
    ColumnRef, IdRef, Nodes, RemoteColumn, decode_columns, if_changed, optional_text,
    text_if_changed,
};
use crate::error::{CodecError, ValidationError};
use crate::model::{PoolStatus, RemoteErrorDetail, TableSchema};
use crate::poller::Observation;
use crate::resource::{Resource, StatusTargets};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data pool resource type
pub struct DataPool;

/// Storage engine of the pool's underlying table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableEngine {
    #[default]
    MergeTree,
    ReplacingMergeTree,
    SummingMergeTree,
    AggregatingMergeTree,
}

impl TableEngine {
    pub const ALL: [TableEngine; 4] = [
        TableEngine::MergeTree,
        TableEngine::ReplacingMergeTree,
        TableEngine::SummingMergeTree,
        TableEngine::AggregatingMergeTree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableEngine::MergeTree => "MERGE_TREE",
            TableEngine::ReplacingMergeTree => "REPLACING_MERGE_TREE",
            TableEngine::SummingMergeTree => "SUMMING_MERGE_TREE",
            TableEngine::AggregatingMergeTree => "AGGREGATING_MERGE_TREE",
        }
    }
}

impl fmt::Display for TableEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableEngine {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "table engine",
                value: s.to_string(),
            })
    }
}

/// Advanced table layout, fixed at creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    #[serde(default)]
    pub engine: TableEngine,
    /// Version column of a replacing engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    /// Columns summed by a summing engine
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sum_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,
}

impl TableSettings {
    pub fn validate(&self, columns: &TableSchema) -> Result<(), ValidationError> {
        if self.ver.is_some() && self.engine != TableEngine::ReplacingMergeTree {
            return Err(ValidationError::UnsupportedForEngine {
                field: "ver",
                engine: self.engine.to_string(),
            });
        }
        if !self.sum_columns.is_empty() && self.engine != TableEngine::SummingMergeTree {
            return Err(ValidationError::UnsupportedForEngine {
                field: "sum columns",
                engine: self.engine.to_string(),
            });
        }

        // Without declared columns the server infers them from the source
        if columns.is_empty() {
            return Ok(());
        }

        let references = self
            .ver
            .iter()
            .map(|c| ("ver", c))
            .chain(self.sum_columns.iter().map(|c| ("sum columns", c)))
            .chain(self.partition_by.iter().map(|c| ("partition_by", c)))
            .chain(self.primary_key.iter().map(|c| ("primary_key", c)))
            .chain(self.order_by.iter().map(|c| ("order_by", c)));

        for (field, column) in references {
            if !columns.contains(column) {
                return Err(ValidationError::UnknownColumn {
                    field,
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Desired state of a data pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoolSpec {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub data_source_id: String,
    pub table: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub columns: TableSchema,
    #[serde(default)]
    pub data_retention_in_days: Option<u32>,
    #[serde(default)]
    pub table_settings: Option<TableSettings>,
}

impl DataPoolSpec {
    pub fn new(data_source_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            unique_name: None,
            description: None,
            data_source_id: data_source_id.into(),
            table: table.into(),
            timestamp: None,
            tenant_id: None,
            unique_id: None,
            columns: TableSchema::default(),
            data_retention_in_days: None,
            table_settings: None,
        }
    }

    pub fn named(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = Some(unique_name.into());
        self
    }

    pub fn with_timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp = Some(column.into());
        self
    }

    pub fn with_columns(mut self, columns: impl Into<TableSchema>) -> Self {
        self.columns = columns.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataPoolField {
    UniqueName,
    Description,
    DataSource,
    Table,
    Timestamp,
    Tenant,
    UniqueId,
    Columns,
    DataRetention,
    TableSettings,
}

impl fmt::Display for DataPoolField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataPoolField::UniqueName => "unique_name",
            DataPoolField::Description => "description",
            DataPoolField::DataSource => "data_source",
            DataPoolField::Table => "table",
            DataPoolField::Timestamp => "timestamp",
            DataPoolField::Tenant => "tenant_id",
            DataPoolField::UniqueId => "unique_id",
            DataPoolField::Columns => "columns",
            DataPoolField::DataRetention => "data_retention_in_days",
            DataPoolField::TableSettings => "table_settings",
        };
        f.write_str(name)
    }
}

impl Desired for DataPoolSpec {
    type Field = DataPoolField;

    fn label(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    fn changed_fields(&self, prior: &Self) -> ChangeSet<DataPoolField> {
        ChangeSet::new()
            .track(DataPoolField::UniqueName, &self.unique_name, &prior.unique_name)
            .track(DataPoolField::Description, &self.description, &prior.description)
            .track(DataPoolField::DataSource, &self.data_source_id, &prior.data_source_id)
            .track(DataPoolField::Table, &self.table, &prior.table)
            .track(DataPoolField::Timestamp, &self.timestamp, &prior.timestamp)
            .track(DataPoolField::Tenant, &self.tenant_id, &prior.tenant_id)
            .track(DataPoolField::UniqueId, &self.unique_id, &prior.unique_id)
            .track(DataPoolField::Columns, &self.columns, &prior.columns)
            .track(
                DataPoolField::DataRetention,
                &self.data_retention_in_days,
                &prior.data_retention_in_days,
            )
            .track(
                DataPoolField::TableSettings,
                &self.table_settings,
                &prior.table_settings,
            )
    }

    fn requires_replacement(field: DataPoolField) -> bool {
        matches!(
            field,
            DataPoolField::DataSource
                | DataPoolField::Table
                | DataPoolField::Timestamp
                | DataPoolField::Tenant
                | DataPoolField::UniqueId
                | DataPoolField::TableSettings
        )
    }

    fn schema_field() -> Option<DataPoolField> {
        Some(DataPoolField::Columns)
    }
}

/// Normalized state of a data pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoolState {
    pub id: String,
    pub unique_name: String,
    pub description: Option<String>,
    pub status: PoolStatus,
    pub data_source_id: String,
    pub table: String,
    pub timestamp: Option<String>,
    pub tenant_id: Option<String>,
    pub unique_id: Option<String>,
    pub columns: TableSchema,
    pub data_retention_in_days: Option<u32>,
    pub table_settings: Option<TableSettings>,
}

// ============ Wire types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInput {
    #[serde(rename = "type")]
    pub engine: TableEngine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettingsInput {
    pub engine: EngineInput,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partition_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,
}

impl From<&TableSettings> for TableSettingsInput {
    fn from(settings: &TableSettings) -> Self {
        Self {
            engine: EngineInput {
                engine: settings.engine,
                ver: settings.ver.clone(),
                columns: settings.sum_columns.clone(),
            },
            partition_by: settings.partition_by.clone(),
            primary_key: settings.primary_key.clone(),
            order_by: settings.order_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDataPoolInput {
    pub data_source: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<ColumnRef>,
    #[serde(skip_serializing_if = "TableSchema::is_empty")]
    pub columns: TableSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention_in_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_settings: Option<TableSettingsInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyDataPoolInput {
    pub id_or_unique_name: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention_in_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEngine {
    #[serde(rename = "type")]
    pub engine: String,
    #[serde(default)]
    pub ver: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTableSettings {
    #[serde(default)]
    pub engine: Option<RemoteEngine>,
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoolEntity {
    pub id: String,
    pub unique_name: String,
    #[serde(default)]
    pub description: String,
    pub status: PoolStatus,
    #[serde(default)]
    pub error: Option<RemoteErrorDetail>,
    pub data_source: IdRef,
    pub table: String,
    #[serde(default)]
    pub timestamp: Option<ColumnRef>,
    #[serde(default)]
    pub tenant: Option<ColumnRef>,
    #[serde(default)]
    pub unique_id: Option<ColumnRef>,
    #[serde(default)]
    pub columns: Nodes<RemoteColumn>,
    #[serde(default)]
    pub data_retention_in_days: Option<u32>,
    #[serde(default)]
    pub table_settings: Option<RemoteTableSettings>,
}

impl Observation for DataPoolEntity {
    type Status = PoolStatus;

    fn status(&self) -> PoolStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.message.clone())
    }
}

// ============ Codec ============

fn column_ref(column: &Option<String>) -> Option<ColumnRef> {
    column.as_deref().map(ColumnRef::new)
}

fn column_name(column: &Option<ColumnRef>) -> Option<String> {
    column.as_ref().map(|c| c.column_name.clone())
}

fn decode_table_settings(remote: &RemoteTableSettings) -> Result<TableSettings, CodecError> {
    let (engine, ver, sum_columns) = match &remote.engine {
        Some(e) => {
            let engine = e.engine.parse().map_err(|_| CodecError::UnknownValue {
                field: "table engine",
                value: e.engine.clone(),
            })?;
            (engine, e.ver.clone(), e.columns.clone())
        }
        None => (TableEngine::default(), None, Vec::new()),
    };

    Ok(TableSettings {
        engine,
        ver,
        sum_columns,
        partition_by: remote.partition_by.clone(),
        primary_key: remote.primary_key.clone(),
        order_by: remote.order_by.clone(),
    })
}

impl Resource for DataPool {
    const KIND: &'static str = "data pool";

    type Spec = DataPoolSpec;
    type State = DataPoolState;
    type Entity = DataPoolEntity;
    type CreateInput = CreateDataPoolInput;
    type ModifyInput = ModifyDataPoolInput;

    fn validate(spec: &DataPoolSpec) -> Result<(), ValidationError> {
        spec.columns.validate()?;

        if !spec.columns.is_empty() {
            let keys = [
                ("timestamp", &spec.timestamp),
                ("tenant_id", &spec.tenant_id),
                ("unique_id", &spec.unique_id),
            ];
            for (field, column) in keys {
                if let Some(column) = column
                    && !spec.columns.contains(column)
                {
                    return Err(ValidationError::UnknownColumn {
                        field,
                        column: column.clone(),
                    });
                }
            }
        }

        if let Some(settings) = &spec.table_settings {
            settings.validate(&spec.columns)?;
        }
        Ok(())
    }

    fn encode_create(spec: &DataPoolSpec) -> Result<CreateDataPoolInput, ValidationError> {
        Ok(CreateDataPoolInput {
            data_source: spec.data_source_id.clone(),
            table: spec.table.clone(),
            unique_name: spec.unique_name.clone(),
            description: spec.description.clone(),
            timestamp: column_ref(&spec.timestamp),
            tenant: column_ref(&spec.tenant_id),
            unique_id: column_ref(&spec.unique_id),
            columns: spec.columns.clone(),
            data_retention_in_days: spec.data_retention_in_days,
            table_settings: spec.table_settings.as_ref().map(TableSettingsInput::from),
        })
    }

    fn encode_modify(
        id: &str,
        _prior: &DataPoolSpec,
        desired: &DataPoolSpec,
        changes: &ChangeSet<DataPoolField>,
    ) -> Result<Option<ModifyDataPoolInput>, ValidationError> {
        let unique_name = changes
            .has_changed(DataPoolField::UniqueName)
            .then(|| desired.unique_name.clone())
            .flatten();
        let description = text_if_changed(changes, DataPoolField::Description, &desired.description);
        let data_retention_in_days =
            if_changed(changes, DataPoolField::DataRetention, &desired.data_retention_in_days)
                .flatten();

        if unique_name.is_none() && description.is_none() && data_retention_in_days.is_none() {
            return Ok(None);
        }

        Ok(Some(ModifyDataPoolInput {
            id_or_unique_name: IdRef::new(id),
            unique_name,
            description,
            data_retention_in_days,
        }))
    }

    fn decode(entity: &DataPoolEntity, local: Option<&DataPoolSpec>) -> Result<DataPoolState, CodecError> {
        let table_settings = match &entity.table_settings {
            Some(remote) => Some(decode_table_settings(remote)?),
            // Keep the declared layout when the server omits it
            None => local.and_then(|spec| spec.table_settings.clone()),
        };

        Ok(DataPoolState {
            id: entity.id.clone(),
            unique_name: entity.unique_name.clone(),
            description: optional_text(&entity.description),
            status: entity.status,
            data_source_id: entity.data_source.id.clone(),
            table: entity.table.clone(),
            timestamp: column_name(&entity.timestamp),
            tenant_id: column_name(&entity.tenant),
            unique_id: column_name(&entity.unique_id),
            columns: decode_columns(&entity.columns.nodes)?,
            data_retention_in_days: entity.data_retention_in_days,
            table_settings,
        })
    }

    fn entity_id(entity: &DataPoolEntity) -> &str {
        &entity.id
    }

    fn state_id(state: &DataPoolState) -> &str {
        &state.id
    }

    fn provisioning() -> Option<StatusTargets<PoolStatus>> {
        Some(StatusTargets::new(
            vec![PoolStatus::Created, PoolStatus::Pending],
            vec![PoolStatus::Live],
        ))
    }

    fn teardown() -> Option<Vec<PoolStatus>> {
        Some(vec![
            PoolStatus::Deleting,
            PoolStatus::Created,
            PoolStatus::Pending,
            PoolStatus::Live,
        ])
    }

    fn table_schema(spec: &DataPoolSpec) -> Option<&TableSchema> {
        Some(&spec.columns)
    }

    fn state_schema(state: &DataPoolState) -> Option<&TableSchema> {
        Some(&state.columns)
    }

    fn column_target(state: &DataPoolState) -> Option<&str> {
        Some(&state.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDescriptor, ColumnType};
    use serde_json::json;

    fn orders() -> DataPoolSpec {
        DataPoolSpec::new("DSO01", "ORDERS")
            .named("orders")
            .with_timestamp("created_at")
            .with_columns(vec![
                ColumnDescriptor::new("created_at", ColumnType::Timestamp, false),
                ColumnDescriptor::new("order_id", ColumnType::String, false),
                ColumnDescriptor::new("amount", ColumnType::Double, true),
            ])
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let spec = orders().with_columns(vec![
            ColumnDescriptor::new("created_at", ColumnType::Timestamp, false),
            ColumnDescriptor::new("created_at", ColumnType::String, true),
        ]);
        let err = DataPool::validate(&spec).unwrap_err();
        assert_eq!(err.to_string(), "column created_at already exists");
    }

    #[test]
    fn test_validate_timestamp_must_reference_column() {
        let spec = orders().with_timestamp("updated_at");
        assert_eq!(
            DataPool::validate(&spec).unwrap_err(),
            ValidationError::UnknownColumn {
                field: "timestamp",
                column: "updated_at".to_string()
            }
        );
    }

    #[test]
    fn test_validate_engine_options() {
        let mut spec = orders();
        spec.table_settings = Some(TableSettings {
            engine: TableEngine::MergeTree,
            ver: Some("created_at".to_string()),
            ..Default::default()
        });
        assert_eq!(
            DataPool::validate(&spec).unwrap_err(),
            ValidationError::UnsupportedForEngine {
                field: "ver",
                engine: "MERGE_TREE".to_string()
            }
        );

        spec.table_settings = Some(TableSettings {
            engine: TableEngine::ReplacingMergeTree,
            ver: Some("created_at".to_string()),
            order_by: vec!["order_id".to_string()],
            ..Default::default()
        });
        assert!(DataPool::validate(&spec).is_ok());

        spec.table_settings = Some(TableSettings {
            engine: TableEngine::SummingMergeTree,
            sum_columns: vec!["total".to_string()],
            ..Default::default()
        });
        assert_eq!(
            DataPool::validate(&spec).unwrap_err(),
            ValidationError::UnknownColumn {
                field: "sum columns",
                column: "total".to_string()
            }
        );
    }

    #[test]
    fn test_table_engine_from_str() {
        assert_eq!(
            "SUMMING_MERGE_TREE".parse::<TableEngine>().unwrap(),
            TableEngine::SummingMergeTree
        );
        assert!("LOG".parse::<TableEngine>().is_err());
    }

    #[test]
    fn test_encode_create_skips_unset() {
        let input = DataPool::encode_create(&DataPoolSpec::new("DSO01", "ORDERS")).unwrap();
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, json!({ "dataSource": "DSO01", "table": "ORDERS" }));
    }

    #[test]
    fn test_encode_create_wire_shape() {
        let mut spec = orders();
        spec.table_settings = Some(TableSettings {
            engine: TableEngine::ReplacingMergeTree,
            ver: Some("created_at".to_string()),
            order_by: vec!["order_id".to_string()],
            ..Default::default()
        });
        let json = serde_json::to_value(DataPool::encode_create(&spec).unwrap()).unwrap();

        assert_eq!(json["timestamp"], json!({ "columnName": "created_at" }));
        assert_eq!(json["columns"][2]["columnName"], "amount");
        assert_eq!(json["columns"][2]["isNullable"], true);
        assert_eq!(
            json["tableSettings"]["engine"],
            json!({ "type": "REPLACING_MERGE_TREE", "ver": "created_at" })
        );
    }

    #[test]
    fn test_column_change_is_not_a_modify_field() {
        let prior = orders();
        let mut desired = orders();
        desired
            .columns
            .push(ColumnDescriptor::new("coupon", ColumnType::String, true));
        let changes = desired.changed_fields(&prior);

        assert!(changes.has_changed(DataPoolField::Columns));
        assert!(!changes.iter().any(DataPoolSpec::requires_replacement));
        assert!(
            DataPool::encode_modify("DPO01", &prior, &desired, &changes)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_encode_modify_retention() {
        let prior = orders();
        let mut desired = orders();
        desired.data_retention_in_days = Some(90);
        let changes = desired.changed_fields(&prior);

        let json = serde_json::to_value(
            DataPool::encode_modify("DPO01", &prior, &desired, &changes)
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            json,
            json!({ "idOrUniqueName": { "id": "DPO01" }, "dataRetentionInDays": 90 })
        );
    }

    #[test]
    fn test_table_change_requires_replacement() {
        let prior = orders();
        let mut desired = orders();
        desired.table = "ORDERS_V2".to_string();
        let changes = desired.changed_fields(&prior);
        assert!(changes.iter().any(DataPoolSpec::requires_replacement));
    }

    #[test]
    fn test_decode_entity() {
        let entity: DataPoolEntity = serde_json::from_value(json!({
            "id": "DPO01",
            "uniqueName": "orders",
            "description": "",
            "status": "LIVE",
            "dataSource": { "id": "DSO01" },
            "table": "ORDERS",
            "timestamp": { "columnName": "created_at" },
            "columns": { "nodes": [
                { "columnName": "created_at", "type": "TIMESTAMP", "isNullable": false },
                { "columnName": "order_id", "type": "STRING", "isNullable": false }
            ]},
            "tableSettings": {
                "engine": { "type": "MERGE_TREE" },
                "orderBy": ["order_id"]
            }
        }))
        .unwrap();

        let state = DataPool::decode(&entity, None).unwrap();
        assert_eq!(state.status, PoolStatus::Live);
        assert_eq!(state.timestamp.as_deref(), Some("created_at"));
        assert_eq!(state.columns.len(), 2);
        assert_eq!(state.description, None);
        assert_eq!(
            state.table_settings.unwrap().order_by,
            vec!["order_id".to_string()]
        );
        assert_eq!(DataPool::column_target(&DataPool::decode(&entity, None).unwrap()), Some("DPO01"));
    }

    #[test]
    fn test_decode_rejects_unknown_engine() {
        let entity: DataPoolEntity = serde_json::from_value(json!({
            "id": "DPO02",
            "uniqueName": "events",
            "status": "LIVE",
            "dataSource": { "id": "DSO02" },
            "table": "EVENTS",
            "tableSettings": { "engine": { "type": "LOG" } }
        }))
        .unwrap();

        assert_eq!(
            DataPool::decode(&entity, None).unwrap_err(),
            CodecError::UnknownValue {
                field: "table engine",
                value: "LOG".to_string()
            }
        );
    }
}
