//! Access policies: column and row restrictions on a data pool

use crate::change::{ChangeSet, Desired};
use crate::codec::{IdRef, Nodes, RemoteFilter, decode_filters, if_changed, optional_text, text_if_changed};
use crate::error::{CodecError, ValidationError};
use crate::model::{Filter, Presence};
use crate::poller::Observation;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Access policy resource type
pub struct Policy;

/// Column list granting access to every column
pub const ALL_COLUMNS: &str = "*";

/// Desired state of an access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub data_pool_id: String,
    /// Readable columns, or `["*"]` for all
    pub columns: Vec<String>,
    /// Row filters a query is restricted to
    #[serde(default)]
    pub rows: Vec<Filter>,
    /// Applications the policy is assigned to
    #[serde(default)]
    pub applications: BTreeSet<String>,
}

impl PolicySpec {
    pub fn all_columns(data_pool_id: impl Into<String>) -> Self {
        Self {
            unique_name: None,
            description: None,
            data_pool_id: data_pool_id.into(),
            columns: vec![ALL_COLUMNS.to_string()],
            rows: Vec::new(),
            applications: BTreeSet::new(),
        }
    }

    pub fn assigned_to<I, S>(mut self, applications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applications = applications.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyField {
    UniqueName,
    Description,
    DataPool,
    Columns,
    Rows,
    Applications,
}

impl fmt::Display for PolicyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyField::UniqueName => "unique_name",
            PolicyField::Description => "description",
            PolicyField::DataPool => "data_pool",
            PolicyField::Columns => "columns",
            PolicyField::Rows => "rows",
            PolicyField::Applications => "applications",
        };
        f.write_str(name)
    }
}

impl Desired for PolicySpec {
    type Field = PolicyField;

    fn label(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    fn changed_fields(&self, prior: &Self) -> ChangeSet<PolicyField> {
        ChangeSet::new()
            .track(PolicyField::UniqueName, &self.unique_name, &prior.unique_name)
            .track(PolicyField::Description, &self.description, &prior.description)
            .track(PolicyField::DataPool, &self.data_pool_id, &prior.data_pool_id)
            .track(PolicyField::Columns, &self.columns, &prior.columns)
            .track(PolicyField::Rows, &self.rows, &prior.rows)
            .track(PolicyField::Applications, &self.applications, &prior.applications)
    }

    fn requires_replacement(field: PolicyField) -> bool {
        field == PolicyField::DataPool
    }
}

/// Normalized state of an access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyState {
    pub id: String,
    pub unique_name: String,
    pub description: Option<String>,
    pub data_pool_id: String,
    pub columns: Vec<String>,
    pub rows: Vec<Filter>,
    pub applications: BTreeSet<String>,
}

// ============ Wire types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyInput {
    pub data_pool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Filter>,
    /// Assigned by the client after the policy exists
    #[serde(skip)]
    pub assign: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyPolicyInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Filter>>,
    #[serde(skip)]
    pub assign: Vec<String>,
    #[serde(skip)]
    pub unassign: Vec<String>,
}

impl ModifyPolicyInput {
    /// Whether any policy field, as opposed to an assignment, changes
    pub fn modifies_policy(&self) -> bool {
        self.unique_name.is_some()
            || self.description.is_some()
            || self.columns.is_some()
            || self.rows.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntity {
    pub id: String,
    #[serde(default)]
    pub unique_name: String,
    #[serde(default)]
    pub description: String,
    pub data_pool: IdRef,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<RemoteFilter>,
    #[serde(default)]
    pub applications: Nodes<IdRef>,
}

impl Observation for PolicyEntity {
    type Status = Presence;

    fn status(&self) -> Presence {
        Presence::Present
    }
}

impl Resource for Policy {
    const KIND: &'static str = "access policy";

    type Spec = PolicySpec;
    type State = PolicyState;
    type Entity = PolicyEntity;
    type CreateInput = CreatePolicyInput;
    type ModifyInput = ModifyPolicyInput;

    fn validate(spec: &PolicySpec) -> Result<(), ValidationError> {
        if spec.columns.is_empty() {
            return Err(ValidationError::MissingField {
                field: "columns",
                variant: Self::KIND.to_string(),
            });
        }
        spec.rows.iter().try_for_each(Filter::validate)
    }

    fn encode_create(spec: &PolicySpec) -> Result<CreatePolicyInput, ValidationError> {
        Ok(CreatePolicyInput {
            data_pool: spec.data_pool_id.clone(),
            unique_name: spec.unique_name.clone(),
            description: spec.description.clone(),
            columns: spec.columns.clone(),
            rows: spec.rows.clone(),
            assign: spec.applications.iter().cloned().collect(),
        })
    }

    fn encode_modify(
        id: &str,
        prior: &PolicySpec,
        desired: &PolicySpec,
        changes: &ChangeSet<PolicyField>,
    ) -> Result<Option<ModifyPolicyInput>, ValidationError> {
        let (assign, unassign) = if changes.has_changed(PolicyField::Applications) {
            (
                desired.applications.difference(&prior.applications).cloned().collect(),
                prior.applications.difference(&desired.applications).cloned().collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let input = ModifyPolicyInput {
            id: id.to_string(),
            unique_name: changes
                .has_changed(PolicyField::UniqueName)
                .then(|| desired.unique_name.clone())
                .flatten(),
            description: text_if_changed(changes, PolicyField::Description, &desired.description),
            columns: if_changed(changes, PolicyField::Columns, &desired.columns),
            rows: if_changed(changes, PolicyField::Rows, &desired.rows),
            assign,
            unassign,
        };

        if !input.modifies_policy() && input.assign.is_empty() && input.unassign.is_empty() {
            return Ok(None);
        }
        Ok(Some(input))
    }

    fn decode(entity: &PolicyEntity, _local: Option<&PolicySpec>) -> Result<PolicyState, CodecError> {
        Ok(PolicyState {
            id: entity.id.clone(),
            unique_name: entity.unique_name.clone(),
            description: optional_text(&entity.description),
            data_pool_id: entity.data_pool.id.clone(),
            columns: entity.columns.clone(),
            rows: decode_filters(&entity.rows)?,
            applications: entity.applications.nodes.iter().map(|a| a.id.clone()).collect(),
        })
    }

    fn entity_id(entity: &PolicyEntity) -> &str {
        &entity.id
    }

    fn state_id(state: &PolicyState) -> &str {
        &state.id
    }
}
