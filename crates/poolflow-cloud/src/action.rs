//! Planned changes and their outcomes

use crate::change::{ChangeSet, Desired};
use crate::resource::{FieldOf, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last applied desired state of a resource and its remote identifier
pub struct Deployed<R: Resource> {
    pub id: String,
    pub spec: R::Spec,
    pub state: R::State,
}

impl<R: Resource> Clone for Deployed<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            spec: self.spec.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R: Resource> fmt::Debug for Deployed<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployed")
            .field("kind", &R::KIND)
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("state", &self.state)
            .finish()
    }
}

/// Executable change for one resource
pub enum Change<R: Resource> {
    Create {
        desired: R::Spec,
    },
    Update {
        id: String,
        prior: R::Spec,
        desired: R::Spec,
        changes: ChangeSet<FieldOf<R>>,
    },
    /// Delete then create, for changes the remote cannot apply in place
    Replace {
        id: String,
        desired: R::Spec,
        changes: ChangeSet<FieldOf<R>>,
    },
    Delete {
        id: String,
    },
    NoOp {
        id: Option<String>,
    },
}

impl<R: Resource> Change<R> {
    /// Compare what is deployed with what is wanted
    pub fn between(deployed: Option<&Deployed<R>>, desired: Option<&R::Spec>) -> Self {
        match (deployed, desired) {
            (None, Some(desired)) => Change::Create {
                desired: desired.clone(),
            },
            (Some(deployed), None) => Change::Delete {
                id: deployed.id.clone(),
            },
            (None, None) => Change::NoOp { id: None },
            (Some(deployed), Some(desired)) => {
                let changes = desired.changed_fields(&deployed.spec);
                if changes.is_empty() {
                    Change::NoOp {
                        id: Some(deployed.id.clone()),
                    }
                } else if changes.iter().any(<R::Spec as Desired>::requires_replacement) {
                    Change::Replace {
                        id: deployed.id.clone(),
                        desired: desired.clone(),
                        changes,
                    }
                } else {
                    Change::Update {
                        id: deployed.id.clone(),
                        prior: deployed.spec.clone(),
                        desired: desired.clone(),
                        changes,
                    }
                }
            }
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Change::Create { .. } => ActionType::Create,
            Change::Update { .. } => ActionType::Update,
            Change::Replace { .. } => ActionType::Replace,
            Change::Delete { .. } => ActionType::Delete,
            Change::NoOp { .. } => ActionType::NoOp,
        }
    }

    /// Serializable summary of the change, labelled with `name`
    pub fn describe(&self, name: &str) -> Action {
        let (resource_id, changed) = match self {
            Change::Create { .. } => (None, Vec::new()),
            Change::Update { id, changes, .. } | Change::Replace { id, changes, .. } => {
                (Some(id.clone()), changes.iter().map(|f| f.to_string()).collect())
            }
            Change::Delete { id } => (Some(id.clone()), Vec::new()),
            Change::NoOp { id } => (id.clone(), Vec::new()),
        };

        let action_type = self.action_type();
        let description = match self {
            Change::Update { changes, .. } => {
                format!("{} {} {} ({})", action_type, R::KIND, name, changes)
            }
            Change::Replace { changes, .. } => {
                let forcing: Vec<String> = changes
                    .iter()
                    .filter(|f| <R::Spec as Desired>::requires_replacement(*f))
                    .map(|f| f.to_string())
                    .collect();
                format!(
                    "{} {} {} ({} cannot change in place)",
                    action_type,
                    R::KIND,
                    name,
                    forcing.join(", ")
                )
            }
            _ => format!("{} {} {}", action_type, R::KIND, name),
        };

        Action {
            action_type,
            kind: R::KIND.to_string(),
            name: name.to_string(),
            resource_id,
            changed,
            description,
        }
    }
}

impl<R: Resource> fmt::Debug for Change<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Create { desired } => f.debug_struct("Create").field("desired", desired).finish(),
            Change::Update { id, changes, .. } => f
                .debug_struct("Update")
                .field("id", id)
                .field("changes", &changes.to_string())
                .finish(),
            Change::Replace { id, changes, .. } => f
                .debug_struct("Replace")
                .field("id", id)
                .field("changes", &changes.to_string())
                .finish(),
            Change::Delete { id } => f.debug_struct("Delete").field("id", id).finish(),
            Change::NoOp { id } => f.debug_struct("NoOp").field("id", id).finish(),
        }
    }
}

/// Result of applying one change
pub enum ApplyOutcome<R: Resource> {
    Applied(R::State),
    Deleted,
    Unchanged,
}

impl<R: Resource> ApplyOutcome<R> {
    pub fn state(&self) -> Option<&R::State> {
        match self {
            ApplyOutcome::Applied(state) => Some(state),
            _ => None,
        }
    }
}

impl<R: Resource> fmt::Debug for ApplyOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Applied(state) => f.debug_tuple("Applied").field(state).finish(),
            ApplyOutcome::Deleted => f.write_str("Deleted"),
            ApplyOutcome::Unchanged => f.write_str("Unchanged"),
        }
    }
}

/// Represents a planned action for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource kind (e.g., "data pool", "metric")
    pub kind: String,

    /// Local name of the resource
    pub name: String,

    /// Remote identifier, absent before creation
    pub resource_id: Option<String>,

    /// Fields that differ from the deployed state
    pub changed: Vec<String>,

    /// Description of the action
    pub description: String,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and recreate a resource
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.has_changes |= action.action_type != ActionType::NoOp;
        self.actions.push(action);
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
