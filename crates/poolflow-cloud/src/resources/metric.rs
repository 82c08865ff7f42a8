//! Metrics: aggregations over a data pool

use crate::change::{ChangeSet, Desired};
use crate::codec::{
    ColumnRef, IdRef, RemoteFilter, decode_filters, if_changed, optional_text, text_if_changed,
};
use crate::error::{CodecError, ValidationError};
use crate::model::{Filter, Presence};
use crate::poller::Observation;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric resource type
pub struct Metric;

/// Aggregation a metric computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Count,
    Sum,
    CountDistinct,
    Average,
    Min,
    Max,
    Custom,
}

impl MetricType {
    pub const ALL: [MetricType; 7] = [
        MetricType::Count,
        MetricType::Sum,
        MetricType::CountDistinct,
        MetricType::Average,
        MetricType::Min,
        MetricType::Max,
        MetricType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Count => "COUNT",
            MetricType::Sum => "SUM",
            MetricType::CountDistinct => "COUNT_DISTINCT",
            MetricType::Average => "AVERAGE",
            MetricType::Min => "MIN",
            MetricType::Max => "MAX",
            MetricType::Custom => "CUSTOM",
        }
    }

    /// Whether the aggregation reads a numeric measure column
    pub fn needs_measure(&self) -> bool {
        matches!(
            self,
            MetricType::Sum | MetricType::Average | MetricType::Min | MetricType::Max
        )
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "metric type",
                value: s.to_string(),
            })
    }
}

/// Desired state of a metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub data_pool_id: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Column aggregated by SUM, AVERAGE, MIN and MAX
    #[serde(default)]
    pub measure: Option<String>,
    /// Column counted by COUNT_DISTINCT
    #[serde(default)]
    pub dimension: Option<String>,
    /// Expression of a CUSTOM metric
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub access_control_enabled: Option<bool>,
}

impl MetricSpec {
    pub fn count(data_pool_id: impl Into<String>) -> Self {
        Self {
            unique_name: None,
            description: None,
            data_pool_id: data_pool_id.into(),
            metric_type: MetricType::Count,
            measure: None,
            dimension: None,
            expression: None,
            dimensions: Vec::new(),
            filters: Vec::new(),
            access_control_enabled: None,
        }
    }

    pub fn sum(data_pool_id: impl Into<String>, measure: impl Into<String>) -> Self {
        Self {
            metric_type: MetricType::Sum,
            measure: Some(measure.into()),
            ..Self::count(data_pool_id)
        }
    }

    pub fn named(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = Some(unique_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricField {
    UniqueName,
    Description,
    DataPool,
    Definition,
    Dimensions,
    Filters,
    AccessControl,
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricField::UniqueName => "unique_name",
            MetricField::Description => "description",
            MetricField::DataPool => "data_pool",
            MetricField::Definition => "type/measure/dimension/expression",
            MetricField::Dimensions => "dimensions",
            MetricField::Filters => "filters",
            MetricField::AccessControl => "access_control_enabled",
        };
        f.write_str(name)
    }
}

impl Desired for MetricSpec {
    type Field = MetricField;

    fn label(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    fn changed_fields(&self, prior: &Self) -> ChangeSet<MetricField> {
        let definition = |m: &MetricSpec| {
            (
                m.metric_type,
                m.measure.clone(),
                m.dimension.clone(),
                m.expression.clone(),
            )
        };
        ChangeSet::new()
            .track(MetricField::UniqueName, &self.unique_name, &prior.unique_name)
            .track(MetricField::Description, &self.description, &prior.description)
            .track(MetricField::DataPool, &self.data_pool_id, &prior.data_pool_id)
            .track(MetricField::Definition, &definition(self), &definition(prior))
            .track(MetricField::Dimensions, &self.dimensions, &prior.dimensions)
            .track(MetricField::Filters, &self.filters, &prior.filters)
            .track(
                MetricField::AccessControl,
                &self.access_control_enabled,
                &prior.access_control_enabled,
            )
    }

    fn requires_replacement(field: MetricField) -> bool {
        matches!(field, MetricField::DataPool | MetricField::Definition)
    }
}

/// Normalized state of a metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricState {
    pub id: String,
    pub unique_name: String,
    pub description: Option<String>,
    pub data_pool_id: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub measure: Option<String>,
    pub dimension: Option<String>,
    pub expression: Option<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<Filter>,
    pub access_control_enabled: bool,
}

// ============ Wire types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetricInput {
    /// Selects the type-specific create mutation
    #[serde(skip)]
    pub metric_type: MetricType,
    pub data_pool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<ColumnRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMetricInput {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<ColumnRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetricSettings {
    #[serde(default)]
    pub measure: Option<ColumnRef>,
    #[serde(default)]
    pub dimension: Option<ColumnRef>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub filters: Vec<RemoteFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntity {
    pub id: String,
    pub unique_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub data_pool: IdRef,
    #[serde(default)]
    pub dimensions: Vec<ColumnRef>,
    #[serde(default)]
    pub settings: RemoteMetricSettings,
    #[serde(default)]
    pub access_control_enabled: bool,
}

impl Observation for MetricEntity {
    type Status = Presence;

    fn status(&self) -> Presence {
        Presence::Present
    }
}

// ============ Codec ============

fn dimension_refs(dimensions: &[String]) -> Vec<ColumnRef> {
    dimensions.iter().map(ColumnRef::new).collect()
}

impl Resource for Metric {
    const KIND: &'static str = "metric";

    type Spec = MetricSpec;
    type State = MetricState;
    type Entity = MetricEntity;
    type CreateInput = CreateMetricInput;
    type ModifyInput = ModifyMetricInput;

    fn validate(spec: &MetricSpec) -> Result<(), ValidationError> {
        let variant = || format!("{} metric", spec.metric_type);

        if spec.metric_type.needs_measure() && spec.measure.is_none() {
            return Err(ValidationError::MissingField {
                field: "measure",
                variant: variant(),
            });
        }
        if spec.metric_type == MetricType::CountDistinct && spec.dimension.is_none() {
            return Err(ValidationError::MissingField {
                field: "dimension",
                variant: variant(),
            });
        }
        if spec.metric_type == MetricType::Custom && spec.expression.is_none() {
            return Err(ValidationError::MissingField {
                field: "expression",
                variant: variant(),
            });
        }

        spec.filters.iter().try_for_each(Filter::validate)
    }

    fn encode_create(spec: &MetricSpec) -> Result<CreateMetricInput, ValidationError> {
        Ok(CreateMetricInput {
            metric_type: spec.metric_type,
            data_pool: spec.data_pool_id.clone(),
            unique_name: spec.unique_name.clone(),
            description: spec.description.clone(),
            measure: spec.measure.as_deref().map(ColumnRef::new),
            dimension: spec.dimension.as_deref().map(ColumnRef::new),
            expression: spec.expression.clone(),
            dimensions: dimension_refs(&spec.dimensions),
            filters: spec.filters.clone(),
            access_control_enabled: spec.access_control_enabled,
        })
    }

    fn encode_modify(
        id: &str,
        _prior: &MetricSpec,
        desired: &MetricSpec,
        changes: &ChangeSet<MetricField>,
    ) -> Result<Option<ModifyMetricInput>, ValidationError> {
        let input = ModifyMetricInput {
            metric: id.to_string(),
            unique_name: changes
                .has_changed(MetricField::UniqueName)
                .then(|| desired.unique_name.clone())
                .flatten(),
            description: text_if_changed(changes, MetricField::Description, &desired.description),
            dimensions: changes
                .has_changed(MetricField::Dimensions)
                .then(|| dimension_refs(&desired.dimensions)),
            filters: if_changed(changes, MetricField::Filters, &desired.filters),
            access_control_enabled: if_changed(
                changes,
                MetricField::AccessControl,
                &desired.access_control_enabled,
            )
            .flatten(),
        };

        let empty = input.unique_name.is_none()
            && input.description.is_none()
            && input.dimensions.is_none()
            && input.filters.is_none()
            && input.access_control_enabled.is_none();
        Ok((!empty).then_some(input))
    }

    fn decode(entity: &MetricEntity, _local: Option<&MetricSpec>) -> Result<MetricState, CodecError> {
        let metric_type: MetricType =
            entity
                .metric_type
                .parse()
                .map_err(|_| CodecError::UnknownValue {
                    field: "metric type",
                    value: entity.metric_type.clone(),
                })?;

        Ok(MetricState {
            id: entity.id.clone(),
            unique_name: entity.unique_name.clone(),
            description: optional_text(&entity.description),
            data_pool_id: entity.data_pool.id.clone(),
            metric_type,
            measure: entity.settings.measure.as_ref().map(|c| c.column_name.clone()),
            dimension: entity.settings.dimension.as_ref().map(|c| c.column_name.clone()),
            expression: entity.settings.expression.clone(),
            dimensions: entity
                .dimensions
                .iter()
                .map(|d| d.column_name.clone())
                .collect(),
            filters: decode_filters(&entity.settings.filters)?,
            access_control_enabled: entity.access_control_enabled,
        })
    }

    fn entity_id(entity: &MetricEntity) -> &str {
        &entity.id
    }

    fn state_id(state: &MetricState) -> &str {
        &state.id
    }
}
