//! Reconciliation error types

use crate::client::ClientError;
use crate::model::{DataSourceType, FilterOperator};
use std::time::Duration;
use thiserror::Error;

/// Malformed or contradictory desired state, raised before any remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("column {0} already exists")]
    DuplicateColumn(String),

    #[error("table {0} already exists")]
    DuplicateTable(String),

    #[error("unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },

    #[error("{field} is required for {variant}")]
    MissingField { field: &'static str, variant: String },

    #[error("{field} is not supported with table engine {engine}")]
    UnsupportedForEngine { field: &'static str, engine: String },

    #[error("{field} references unknown column {column}")]
    UnknownColumn { field: &'static str, column: String },

    #[error("filter on {column}: operator {operator} {reason}")]
    InvalidFilter {
        column: String,
        operator: FilterOperator,
        reason: &'static str,
    },

    #[error("{field} cannot be changed in place, the resource must be replaced")]
    RequiresReplacement { field: String },
}

/// Remote entity could not be projected back into local state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("connection settings mismatch: expected {expected}, server returned {found}")]
    SettingsMismatch {
        expected: DataSourceType,
        found: DataSourceType,
    },

    #[error("server returned connection settings this client does not support for a {kind} data source")]
    UnsupportedSettings { kind: DataSourceType },

    #[error("unknown {field} value from server: {value}")]
    UnknownValue { field: &'static str, value: String },

    #[error("missing {0} in server response")]
    MissingField(&'static str),
}

/// Local state file errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state file version {found} is newer than supported version {supported}")]
    Version { found: u32, supported: u32 },

    #[error("state is locked by {holder} since {since}")]
    Locked { holder: String, since: String },
}

/// Schema change that is not purely additive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaEvolutionError {
    #[error("column {column} was removed, column deletions are not supported")]
    Removed { column: String },

    #[error(
        "column {column} was modified, column modifications are not supported ({attribute} changed)"
    )]
    Modified {
        column: String,
        attribute: &'static str,
    },

    #[error("new column {column} must be nullable")]
    NotNullable { column: String },
}

impl SchemaEvolutionError {
    pub fn column(&self) -> &str {
        match self {
            SchemaEvolutionError::Removed { column }
            | SchemaEvolutionError::Modified { column, .. }
            | SchemaEvolutionError::NotNullable { column } => column,
        }
    }
}

/// Lifecycle step an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    AddColumn,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::AddColumn => write!(f, "add column to"),
        }
    }
}

/// Operation, resource kind and identifier attached to every error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpContext {
    pub operation: Operation,
    pub kind: &'static str,
    /// Remote identifier, or the unique name before one is assigned
    pub id: String,
}

impl OpContext {
    pub fn new(operation: Operation, kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for OpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.operation, self.kind, self.id)
    }
}

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{context}: invalid configuration: {source}")]
    Validation {
        context: OpContext,
        #[source]
        source: ValidationError,
    },

    #[error("{context}: {source}")]
    Client {
        context: OpContext,
        #[source]
        source: ClientError,
    },

    #[error("{context}: remote operation failed: {message}")]
    Failure { context: OpContext, message: String },

    #[error("{context}: resource not found")]
    NotFound { context: OpContext },

    #[error("{context}: timed out after {elapsed:?}, last status: {}", .last_status.as_deref().unwrap_or("none"))]
    Timeout {
        context: OpContext,
        last_status: Option<String>,
        elapsed: Duration,
    },

    #[error("{context}: unexpected status {status}")]
    UnexpectedStatus { context: OpContext, status: String },

    #[error("{context}: {source}")]
    SchemaEvolution {
        context: OpContext,
        #[source]
        source: SchemaEvolutionError,
    },

    #[error("{context}: {source}")]
    Codec {
        context: OpContext,
        #[source]
        source: CodecError,
    },

    #[error("{context}: cancelled")]
    Cancelled { context: OpContext },

    #[error("{context}: no job client configured for column additions")]
    MissingJobApi { context: OpContext },
}

impl ReconcileError {
    pub fn context(&self) -> &OpContext {
        match self {
            ReconcileError::Validation { context, .. }
            | ReconcileError::Client { context, .. }
            | ReconcileError::Failure { context, .. }
            | ReconcileError::NotFound { context }
            | ReconcileError::Timeout { context, .. }
            | ReconcileError::UnexpectedStatus { context, .. }
            | ReconcileError::SchemaEvolution { context, .. }
            | ReconcileError::Codec { context, .. }
            | ReconcileError::Cancelled { context }
            | ReconcileError::MissingJobApi { context } => context,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ReconcileError::NotFound { .. } => true,
            ReconcileError::Client { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReconcileError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_context() {
        let err = ReconcileError::SchemaEvolution {
            context: OpContext::new(Operation::Update, "data pool", "DPO01"),
            source: SchemaEvolutionError::NotNullable {
                column: "C".to_string(),
            },
        };

        assert_eq!(
            err.to_string(),
            "update data pool DPO01: new column C must be nullable"
        );
        assert_eq!(err.context().id, "DPO01");
    }

    #[test]
    fn test_timeout_message() {
        let err = ReconcileError::Timeout {
            context: OpContext::new(Operation::Create, "data pool", "DPO01"),
            last_status: Some("PENDING".to_string()),
            elapsed: Duration::from_secs(900),
        };

        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "create data pool DPO01: timed out after 900s, last status: PENDING"
        );
    }
}
