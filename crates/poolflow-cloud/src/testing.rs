//! Scripted in-memory clients for orchestrator tests
//!
//! Responses are queued per operation and consumed in order. The last queued
//! `get` response repeats, so a poll loop settles on it.

use crate::client::{ClientError, CreateResponse, JobApi, ResourceApi};
use crate::model::{AddColumnJob, ColumnDescriptor};
use crate::resource::Resource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Remote call observed by a scripted client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create,
    Get(String),
    Modify,
    Delete(String),
    CreateJob { pool_id: String, column: String },
    GetJob(String),
}

fn unscripted<T>(operation: &str) -> Result<T, ClientError> {
    Err(ClientError::Other(format!("no scripted response for {operation}")))
}

/// Pop the next response; the final one stays queued when `sticky`
fn next<T: Clone>(queue: &mut VecDeque<T>, sticky: bool) -> Option<T> {
    if sticky && queue.len() == 1 {
        return queue.front().cloned();
    }
    queue.pop_front()
}

struct Script<R: Resource> {
    create: VecDeque<Result<CreateResponse<R::Entity>, ClientError>>,
    get: VecDeque<Result<R::Entity, ClientError>>,
    modify: VecDeque<Result<R::Entity, ClientError>>,
    delete: VecDeque<Result<(), ClientError>>,
    created: Vec<R::CreateInput>,
    modified: Vec<R::ModifyInput>,
    calls: Vec<Call>,
}

/// [`ResourceApi`] replaying queued responses
pub struct ScriptedApi<R: Resource> {
    script: Mutex<Script<R>>,
}

impl<R: Resource> Default for ScriptedApi<R> {
    fn default() -> Self {
        Self {
            script: Mutex::new(Script {
                create: VecDeque::new(),
                get: VecDeque::new(),
                modify: VecDeque::new(),
                delete: VecDeque::new(),
                created: Vec::new(),
                modified: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }
}

impl<R: Resource> ScriptedApi<R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script<R>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn on_create(self, response: Result<CreateResponse<R::Entity>, ClientError>) -> Self {
        self.lock().create.push_back(response);
        self
    }

    pub fn on_get(self, response: Result<R::Entity, ClientError>) -> Self {
        self.lock().get.push_back(response);
        self
    }

    pub fn on_modify(self, response: Result<R::Entity, ClientError>) -> Self {
        self.lock().modify.push_back(response);
        self
    }

    pub fn on_delete(self, response: Result<(), ClientError>) -> Self {
        self.lock().delete.push_back(response);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Create inputs received so far
    pub fn take_created(&self) -> Vec<R::CreateInput> {
        std::mem::take(&mut self.lock().created)
    }

    /// Modify inputs received so far
    pub fn take_modified(&self) -> Vec<R::ModifyInput> {
        std::mem::take(&mut self.lock().modified)
    }
}

#[async_trait]
impl<R: Resource> ResourceApi<R> for ScriptedApi<R> {
    async fn create(&self, input: R::CreateInput) -> Result<CreateResponse<R::Entity>, ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::Create);
        script.created.push(input);
        next(&mut script.create, false).unwrap_or_else(|| unscripted("create"))
    }

    async fn get(&self, id: &str) -> Result<R::Entity, ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::Get(id.to_string()));
        next(&mut script.get, true).unwrap_or_else(|| unscripted("get"))
    }

    async fn modify(&self, input: R::ModifyInput) -> Result<R::Entity, ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::Modify);
        script.modified.push(input);
        next(&mut script.modify, false).unwrap_or_else(|| unscripted("modify"))
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::Delete(id.to_string()));
        next(&mut script.delete, false).unwrap_or_else(|| unscripted("delete"))
    }
}

#[derive(Default)]
struct JobScript {
    create: VecDeque<Result<AddColumnJob, ClientError>>,
    get: VecDeque<Result<AddColumnJob, ClientError>>,
    columns: Vec<ColumnDescriptor>,
    calls: Vec<Call>,
}

/// [`JobApi`] replaying queued responses
#[derive(Default)]
pub struct ScriptedJobs {
    script: Mutex<JobScript>,
}

impl ScriptedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn on_create(self, response: Result<AddColumnJob, ClientError>) -> Self {
        self.lock().create.push_back(response);
        self
    }

    pub fn on_get(self, response: Result<AddColumnJob, ClientError>) -> Self {
        self.lock().get.push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Columns submitted to add-column jobs, in submission order
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.lock().columns.clone()
    }
}

#[async_trait]
impl JobApi for ScriptedJobs {
    async fn create_add_column_job(
        &self,
        pool_id: &str,
        column: &ColumnDescriptor,
    ) -> Result<AddColumnJob, ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::CreateJob {
            pool_id: pool_id.to_string(),
            column: column.name.clone(),
        });
        script.columns.push(column.clone());
        next(&mut script.create, false).unwrap_or_else(|| unscripted("create add column job"))
    }

    async fn get_add_column_job(&self, id: &str) -> Result<AddColumnJob, ClientError> {
        let mut script = self.lock();
        script.calls.push(Call::GetJob(id.to_string()));
        // Jobs are polled until terminal; keep answering with the last response
        next(&mut script.get, true).unwrap_or_else(|| unscripted("get add column job"))
    }
}

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
