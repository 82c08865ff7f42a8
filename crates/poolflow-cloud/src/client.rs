//! Remote operation client traits
//!
//! The engine never talks to the network itself. Every remote call goes
//! through these traits so transports (GraphQL, scripted fakes) can be
//! swapped without touching the lifecycle logic.

use crate::model::{AddColumnJob, ColumnDescriptor};
use crate::resource::Resource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a client error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Transport,
    Other,
}

/// Errors returned by a remote operation client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Other(String),
}

impl ClientError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::NotFound(_) => ErrorClass::NotFound,
            ClientError::Transport(_) => ErrorClass::Transport,
            ClientError::Other(_) => ErrorClass::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Business-logic failure reported by a structurally successful call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

impl std::fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Result of a create call
#[derive(Debug, Clone, PartialEq)]
pub enum CreateResponse<E> {
    Created(E),
    Failed(FailureDetail),
}

/// Create/get/modify/delete operations for one resource type
#[async_trait]
pub trait ResourceApi<R: Resource>: Send + Sync {
    async fn create(&self, input: R::CreateInput) -> Result<CreateResponse<R::Entity>, ClientError>;

    async fn get(&self, id: &str) -> Result<R::Entity, ClientError>;

    async fn modify(&self, input: R::ModifyInput) -> Result<R::Entity, ClientError>;

    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

/// Asynchronous schema-mutation jobs
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn create_add_column_job(
        &self,
        pool_id: &str,
        column: &ColumnDescriptor,
    ) -> Result<AddColumnJob, ClientError>;

    async fn get_add_column_job(&self, id: &str) -> Result<AddColumnJob, ClientError>;
}
