//! Materialized views: SQL transformations writing into a data pool

use crate::change::{ChangeSet, Desired};
use crate::codec::{ColumnRef, IdRef, optional_text, text_if_changed};
use crate::error::{CodecError, ValidationError};
use crate::model::Presence;
use crate::poller::Observation;
use crate::resource::Resource;
use crate::resources::data_pool::{TableSettings, TableSettingsInput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Materialized view resource type
pub struct MaterializedView;

/// Data pool the view writes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum Destination {
    /// An existing pool, by id
    Existing { data_pool_id: String },
    /// A pool created together with the view
    New(NewPool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_settings: Option<TableSettings>,
}

/// Desired state of a materialized view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedViewSpec {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub sql: String,
    pub destination: Destination,
    /// Replay existing source rows into the destination on creation
    #[serde(default)]
    pub backfill: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaterializedViewField {
    UniqueName,
    Description,
    Sql,
    Destination,
    Backfill,
}

impl fmt::Display for MaterializedViewField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaterializedViewField::UniqueName => "unique_name",
            MaterializedViewField::Description => "description",
            MaterializedViewField::Sql => "sql",
            MaterializedViewField::Destination => "destination",
            MaterializedViewField::Backfill => "backfill",
        };
        f.write_str(name)
    }
}

impl Desired for MaterializedViewSpec {
    type Field = MaterializedViewField;

    fn label(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    fn changed_fields(&self, prior: &Self) -> ChangeSet<MaterializedViewField> {
        ChangeSet::new()
            .track(MaterializedViewField::UniqueName, &self.unique_name, &prior.unique_name)
            .track(MaterializedViewField::Description, &self.description, &prior.description)
            .track(MaterializedViewField::Sql, &self.sql, &prior.sql)
            .track(MaterializedViewField::Destination, &self.destination, &prior.destination)
            .track(MaterializedViewField::Backfill, &self.backfill, &prior.backfill)
    }

    fn requires_replacement(field: MaterializedViewField) -> bool {
        matches!(
            field,
            MaterializedViewField::Sql | MaterializedViewField::Destination
        )
    }
}

/// Normalized state of a materialized view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedViewState {
    pub id: String,
    pub unique_name: String,
    pub description: Option<String>,
    pub sql: String,
    /// Pool the view writes into, whether it existed before or not
    pub destination_id: String,
    pub source_id: Option<String>,
    pub backfill: bool,
}

// ============ Wire types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPoolInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_settings: Option<TableSettingsInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_data_pool: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_data_pool: Option<NewPoolInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterializedViewInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sql: String,
    pub destination: DestinationInput,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub backfill: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMaterializedViewInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedViewEntity {
    pub id: String,
    pub unique_name: String,
    #[serde(default)]
    pub description: String,
    pub sql: String,
    pub destination: IdRef,
    #[serde(default)]
    pub source: Option<IdRef>,
}

impl Observation for MaterializedViewEntity {
    type Status = Presence;

    fn status(&self) -> Presence {
        Presence::Present
    }
}

// ============ Codec ============

fn encode_destination(destination: &Destination) -> DestinationInput {
    match destination {
        Destination::Existing { data_pool_id } => DestinationInput {
            existing_data_pool: Some(IdRef::new(data_pool_id.clone())),
            new_data_pool: None,
        },
        Destination::New(pool) => DestinationInput {
            existing_data_pool: None,
            new_data_pool: Some(NewPoolInput {
                unique_name: pool.unique_name.clone(),
                description: pool.description.clone(),
                timestamp: pool.timestamp.as_deref().map(ColumnRef::new),
                table_settings: pool.table_settings.as_ref().map(TableSettingsInput::from),
            }),
        },
    }
}

impl Resource for MaterializedView {
    const KIND: &'static str = "materialized view";

    type Spec = MaterializedViewSpec;
    type State = MaterializedViewState;
    type Entity = MaterializedViewEntity;
    type CreateInput = CreateMaterializedViewInput;
    type ModifyInput = ModifyMaterializedViewInput;

    fn validate(spec: &MaterializedViewSpec) -> Result<(), ValidationError> {
        if spec.sql.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "sql",
                variant: Self::KIND.to_string(),
            });
        }
        if let Destination::New(NewPool {
            table_settings: Some(settings),
            ..
        }) = &spec.destination
        {
            // Columns of a new destination come from the query
            settings.validate(&Default::default())?;
        }
        Ok(())
    }

    fn encode_create(
        spec: &MaterializedViewSpec,
    ) -> Result<CreateMaterializedViewInput, ValidationError> {
        Ok(CreateMaterializedViewInput {
            unique_name: spec.unique_name.clone(),
            description: spec.description.clone(),
            sql: spec.sql.clone(),
            destination: encode_destination(&spec.destination),
            backfill: spec.backfill,
        })
    }

    fn encode_modify(
        id: &str,
        _prior: &MaterializedViewSpec,
        desired: &MaterializedViewSpec,
        changes: &ChangeSet<MaterializedViewField>,
    ) -> Result<Option<ModifyMaterializedViewInput>, ValidationError> {
        let unique_name = changes
            .has_changed(MaterializedViewField::UniqueName)
            .then(|| desired.unique_name.clone())
            .flatten();
        let description =
            text_if_changed(changes, MaterializedViewField::Description, &desired.description);

        if unique_name.is_none() && description.is_none() {
            return Ok(None);
        }

        Ok(Some(ModifyMaterializedViewInput {
            id: id.to_string(),
            unique_name,
            description,
        }))
    }

    fn decode(
        entity: &MaterializedViewEntity,
        local: Option<&MaterializedViewSpec>,
    ) -> Result<MaterializedViewState, CodecError> {
        Ok(MaterializedViewState {
            id: entity.id.clone(),
            unique_name: entity.unique_name.clone(),
            description: optional_text(&entity.description),
            sql: entity.sql.clone(),
            destination_id: entity.destination.id.clone(),
            source_id: entity.source.as_ref().map(|s| s.id.clone()),
            // Backfill is a one-shot creation flag the server does not report
            backfill: local.is_some_and(|spec| spec.backfill),
        })
    }

    fn entity_id(entity: &MaterializedViewEntity) -> &str {
        &entity.id
    }

    fn state_id(state: &MaterializedViewState) -> &str {
        &state.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(destination: Destination) -> MaterializedViewSpec {
        MaterializedViewSpec {
            unique_name: Some("daily-orders".to_string()),
            description: None,
            sql: "SELECT date, count() FROM orders GROUP BY date".to_string(),
            destination,
            backfill: true,
        }
    }

    #[test]
    fn test_encode_create_existing_destination() {
        let spec = view(Destination::Existing {
            data_pool_id: "DPO09".to_string(),
        });
        let json = serde_json::to_value(MaterializedView::encode_create(&spec).unwrap()).unwrap();

        assert_eq!(json["destination"], json!({ "existingDataPool": { "id": "DPO09" } }));
        assert_eq!(json["backfill"], true);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_encode_create_new_destination() {
        let spec = view(Destination::New(NewPool {
            unique_name: Some("daily-orders-pool".to_string()),
            timestamp: Some("date".to_string()),
            ..Default::default()
        }));
        let json = serde_json::to_value(MaterializedView::encode_create(&spec).unwrap()).unwrap();

        assert_eq!(
            json["destination"],
            json!({ "newDataPool": {
                "uniqueName": "daily-orders-pool",
                "timestamp": { "columnName": "date" }
            }})
        );
    }

    #[test]
    fn test_empty_sql_rejected() {
        let mut spec = view(Destination::Existing {
            data_pool_id: "DPO09".to_string(),
        });
        spec.sql = "  ".to_string();
        assert!(matches!(
            MaterializedView::validate(&spec),
            Err(ValidationError::MissingField { field: "sql", .. })
        ));
    }

    #[test]
    fn test_sql_change_requires_replacement() {
        let prior = view(Destination::Existing {
            data_pool_id: "DPO09".to_string(),
        });
        let mut desired = prior.clone();
        desired.sql = "SELECT 1".to_string();
        desired.description = Some("rollup".to_string());
        let changes = desired.changed_fields(&prior);

        let blocking: Vec<_> = changes
            .iter()
            .filter(|f| MaterializedViewSpec::requires_replacement(*f))
            .collect();
        assert_eq!(blocking, vec![MaterializedViewField::Sql]);
    }

    #[test]
    fn test_decode_carries_backfill() {
        let entity: MaterializedViewEntity = serde_json::from_value(json!({
            "id": "MAT01",
            "uniqueName": "daily-orders",
            "sql": "SELECT 1",
            "destination": { "id": "DPO09" },
            "source": { "id": "DPO01" }
        }))
        .unwrap();
        let local = view(Destination::Existing {
            data_pool_id: "DPO09".to_string(),
        });

        let state = MaterializedView::decode(&entity, Some(&local)).unwrap();
        assert!(state.backfill);
        assert_eq!(state.destination_id, "DPO09");
        assert_eq!(state.source_id.as_deref(), Some("DPO01"));
        assert_eq!(entity.status(), Presence::Present);
    }
}
