//! Resource type abstraction
//!
//! One implementation per resource type binds its desired state, normalized
//! state, remote entity and wire inputs to the field codec. The generic
//! [`Reconciler`](crate::reconciler::Reconciler) drives every type through
//! the same lifecycle.

use crate::change::ChangeSet;
use crate::change::Desired;
use crate::error::{CodecError, ValidationError};
use crate::model::TableSchema;
use crate::poller::Observation;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Field identifier of a resource's desired state
pub type FieldOf<R> = <<R as Resource>::Spec as Desired>::Field;

/// Status type of a resource's remote entity
pub type StatusOf<R> = <<R as Resource>::Entity as Observation>::Status;

/// Pending and target statuses of an asynchronous transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTargets<S> {
    pub pending: Vec<S>,
    pub target: Vec<S>,
}

impl<S> StatusTargets<S> {
    pub fn new(pending: Vec<S>, target: Vec<S>) -> Self {
        Self { pending, target }
    }
}

pub trait Resource: Send + Sync + 'static {
    /// Human-readable kind used in logs and errors ("data pool")
    const KIND: &'static str;

    type Spec: Desired + fmt::Debug + Serialize + DeserializeOwned;
    type State: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned;
    type Entity: Observation + Clone + fmt::Debug + Sync;
    type CreateInput: fmt::Debug + Send + Sync;
    type ModifyInput: fmt::Debug + Send + Sync;

    /// Local checks that need no remote call
    fn validate(_spec: &Self::Spec) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Operation input carrying only the fields the caller set
    fn encode_create(spec: &Self::Spec) -> Result<Self::CreateInput, ValidationError>;

    /// Partial input carrying only fields in `changes`
    ///
    /// Returns `None` when no modifiable field changed. Never populates the
    /// schema field; columns evolve through add-column jobs.
    fn encode_modify(
        id: &str,
        prior: &Self::Spec,
        desired: &Self::Spec,
        changes: &ChangeSet<FieldOf<Self>>,
    ) -> Result<Option<Self::ModifyInput>, ValidationError>;

    /// Project the remote entity into normalized state
    ///
    /// `local` is the last-known desired state; values the server never
    /// echoes back (secrets) are carried over from it.
    fn decode(entity: &Self::Entity, local: Option<&Self::Spec>) -> Result<Self::State, CodecError>;

    fn entity_id(entity: &Self::Entity) -> &str;

    fn state_id(state: &Self::State) -> &str;

    /// Statuses to wait through after create, for asynchronously provisioned types
    fn provisioning() -> Option<StatusTargets<StatusOf<Self>>> {
        None
    }

    /// Statuses reported while teardown is in progress, for types deleted asynchronously
    fn teardown() -> Option<Vec<StatusOf<Self>>> {
        None
    }

    /// Evolvable column set of a desired state
    fn table_schema(_spec: &Self::Spec) -> Option<&TableSchema> {
        None
    }

    /// Columns the remote entity already has
    fn state_schema(_state: &Self::State) -> Option<&TableSchema> {
        None
    }

    /// Data pool that receives add-column jobs for this resource
    fn column_target(_state: &Self::State) -> Option<&str> {
        None
    }
}
