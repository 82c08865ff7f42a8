//! Poolflow reconciliation engine
//!
//! This crate reconciles declarative descriptions of data-platform resources
//! (data sources, data pools, materialized views, metrics and access
//! policies) against a remote API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              Reconciler<R: Resource>             │
//! │     create / read / update / delete / apply      │
//! └───────┬──────────────┬──────────────┬───────────┘
//!         │              │              │
//! ┌───────▼──────┐ ┌─────▼──────┐ ┌─────▼──────────┐
//! │ Field Codec  │ │  Schema    │ │  Completion    │
//! │ encode/decode│ │  Evolution │ │  Poller        │
//! └──────────────┘ └────────────┘ └────────────────┘
//!         │
//! ┌───────▼─────────────────────────────────────────┐
//! │   Remote Operation Client (ResourceApi, JobApi)  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! The remote client is a trait; `poolflow-propel` provides the GraphQL
//! implementation and the `test-utils` feature provides scripted fakes.

pub mod action;
pub mod change;
pub mod client;
pub mod codec;
pub mod error;
pub mod evolution;
pub mod model;
pub mod poller;
pub mod reconciler;
pub mod resource;
pub mod resources;
pub mod state;

#[cfg(feature = "test-utils")]
pub mod testing;

// Re-exports
pub use action::{Action, ActionType, ApplyOutcome, Change, Deployed, Plan, PlanSummary};
pub use change::{ChangeSet, Desired};
pub use client::{ClientError, CreateResponse, ErrorClass, FailureDetail, JobApi, ResourceApi};
pub use error::{
    CodecError, OpContext, Operation, ReconcileError, Result, SchemaEvolutionError, StateError,
    ValidationError,
};
pub use evolution::{SchemaDiff, diff, plan_additions};
pub use model::{
    AddColumnJob, ColumnDescriptor, ColumnType, ConnectionSettings, DataSourceType, Filter,
    FilterOperator, JobStatus, TableSchema,
};
pub use poller::{Observation, PollError, PollMode, PollOutcome, PollSpec, PollTiming, wait_for};
pub use reconciler::{Reconciler, Timeouts};
pub use resource::{Resource, StatusTargets};
pub use resources::{DataPool, DataSource, MaterializedView, Metric, Policy};
pub use state::{StateFile, StateLock, StateStore, StoredResource};
