//! Resource lifecycle orchestration
//!
//! [`Reconciler`] drives one resource type through create, read, update and
//! delete, composing the field codec, the schema evolution guard and the
//! completion poller around a [`ResourceApi`].

use crate::action::{ApplyOutcome, Change, Deployed};
use crate::change::Desired;
use crate::client::{ClientError, CreateResponse, JobApi, ResourceApi};
use crate::error::{OpContext, Operation, ReconcileError, Result, ValidationError};
use crate::evolution::plan_additions;
use crate::model::{ColumnDescriptor, JobStatus, TableSchema};
use crate::poller::{PollError, PollOutcome, PollSpec, PollTiming, wait_for};
use crate::resource::{Resource, StatusOf};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bounds for each asynchronous wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    /// Wait after an in-place modify; column additions use `create` per job
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(15 * 60),
            update: Duration::from_secs(15 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

/// Lifecycle orchestrator for one resource type
pub struct Reconciler<R: Resource> {
    api: Arc<dyn ResourceApi<R>>,
    jobs: Option<Arc<dyn JobApi>>,
    timeouts: Timeouts,
    timing: PollTiming,
    cancel: CancellationToken,
}

impl<R: Resource> Clone for Reconciler<R> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            jobs: self.jobs.clone(),
            timeouts: self.timeouts.clone(),
            timing: self.timing.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

fn context<R: Resource>(operation: Operation, id: &str) -> OpContext {
    OpContext::new(operation, R::KIND, id)
}

fn poll_failure(context: OpContext, error: PollError) -> ReconcileError {
    match error {
        PollError::Timeout {
            last_status,
            elapsed,
        } => ReconcileError::Timeout {
            context,
            last_status,
            elapsed,
        },
        PollError::UnexpectedStatus {
            status,
            message: Some(message),
        } => ReconcileError::Failure {
            context,
            message: format!("{status}: {message}"),
        },
        PollError::UnexpectedStatus {
            status,
            message: None,
        } => ReconcileError::UnexpectedStatus { context, status },
        PollError::Refresh(source) => ReconcileError::Client { context, source },
        PollError::Cancelled => ReconcileError::Cancelled { context },
    }
}

impl<R: Resource> Reconciler<R> {
    pub fn new(api: Arc<dyn ResourceApi<R>>) -> Self {
        Self {
            api,
            jobs: None,
            timeouts: Timeouts::default(),
            timing: PollTiming::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Client for add-column jobs, required by types with an evolvable schema
    pub fn with_jobs(mut self, jobs: Arc<dyn JobApi>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Token aborting every wait of this reconciler
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Refresh the entity until `poll` completes
    async fn wait(
        &self,
        poll: &PollSpec<StatusOf<R>>,
        operation: Operation,
        id: &str,
    ) -> Result<PollOutcome<R::Entity>> {
        let api = self.api.as_ref();
        wait_for(poll, &self.cancel, move || api.get(id))
            .await
            .map_err(|e| poll_failure(context::<R>(operation, id), e))
    }

    async fn fetch(&self, operation: Operation, id: &str) -> Result<R::Entity> {
        self.api.get(id).await.map_err(|source| {
            if source.is_not_found() {
                ReconcileError::NotFound {
                    context: context::<R>(operation, id),
                }
            } else {
                ReconcileError::Client {
                    context: context::<R>(operation, id),
                    source,
                }
            }
        })
    }

    fn decode(&self, operation: Operation, entity: &R::Entity, local: Option<&R::Spec>) -> Result<R::State> {
        R::decode(entity, local).map_err(|source| ReconcileError::Codec {
            context: context::<R>(operation, R::entity_id(entity)),
            source,
        })
    }

    /// Create the resource and wait for it to become usable
    pub async fn create(&self, spec: &R::Spec) -> Result<R::State> {
        let label = spec.label().unwrap_or("(unnamed)");
        let validation = |source: ValidationError| ReconcileError::Validation {
            context: context::<R>(Operation::Create, label),
            source,
        };

        R::validate(spec).map_err(validation)?;
        let input = R::encode_create(spec).map_err(validation)?;

        tracing::info!(kind = R::KIND, name = label, "creating");
        let response = self
            .api
            .create(input)
            .await
            .map_err(|source| ReconcileError::Client {
                context: context::<R>(Operation::Create, label),
                source,
            })?;

        let entity = match response {
            CreateResponse::Created(entity) => entity,
            CreateResponse::Failed(detail) => {
                return Err(ReconcileError::Failure {
                    context: context::<R>(Operation::Create, label),
                    message: detail.message,
                });
            }
        };

        let id = R::entity_id(&entity).to_string();
        let entity = match R::provisioning() {
            Some(targets) => {
                tracing::debug!(kind = R::KIND, id = %id, "waiting for provisioning");
                let poll = PollSpec::new(targets.pending, targets.target, self.timeouts.create)
                    .with_timing(self.timing.clone());
                match self.wait(&poll, Operation::Create, &id).await? {
                    PollOutcome::Reached(entity) => entity,
                    PollOutcome::Gone => {
                        return Err(ReconcileError::NotFound {
                            context: context::<R>(Operation::Create, &id),
                        });
                    }
                }
            }
            None => entity,
        };

        let state = self.decode(Operation::Create, &entity, Some(spec))?;
        tracing::info!(kind = R::KIND, id = %id, "created");
        Ok(state)
    }

    /// Current state, or `None` when the entity no longer exists
    pub async fn read(&self, id: &str, local: Option<&R::Spec>) -> Result<Option<R::State>> {
        match self.api.get(id).await {
            Ok(entity) => self.decode(Operation::Read, &entity, local).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::debug!(kind = R::KIND, id, "not found");
                Ok(None)
            }
            Err(source) => Err(ReconcileError::Client {
                context: context::<R>(Operation::Read, id),
                source,
            }),
        }
    }

    /// Apply in-place changes from `prior` to `desired`
    ///
    /// New columns are added one job at a time before any other field is
    /// modified. Fields that cannot change in place are rejected without a
    /// remote call; use [`Reconciler::apply`] with a replace change instead.
    pub async fn update(&self, id: &str, prior: &R::Spec, desired: &R::Spec) -> Result<R::State> {
        let validation = |source: ValidationError| ReconcileError::Validation {
            context: context::<R>(Operation::Update, id),
            source,
        };

        R::validate(desired).map_err(validation)?;

        let changes = desired.changed_fields(prior);
        if let Some(field) = changes
            .iter()
            .find(|f| <R::Spec as Desired>::requires_replacement(*f))
        {
            return Err(validation(ValidationError::RequiresReplacement {
                field: field.to_string(),
            }));
        }

        let mut remaining = changes.clone();
        if let Some(field) = <R::Spec as Desired>::schema_field()
            && changes.has_changed(field)
        {
            remaining = changes.without(field);

            let empty = TableSchema::default();
            let old = R::table_schema(prior).unwrap_or(&empty);
            let new = R::table_schema(desired).unwrap_or(&empty);
            let additions =
                plan_additions(old, new).map_err(|source| ReconcileError::SchemaEvolution {
                    context: context::<R>(Operation::Update, id),
                    source,
                })?;

            if !additions.is_empty() {
                self.add_columns(id, desired, additions).await?;
            }
        }

        let modified = match R::encode_modify(id, prior, desired, &remaining).map_err(validation)? {
            Some(input) => {
                tracing::info!(kind = R::KIND, id, changes = %remaining, "modifying");
                self.api
                    .modify(input)
                    .await
                    .map_err(|source| ReconcileError::Client {
                        context: context::<R>(Operation::Update, id),
                        source,
                    })?;
                true
            }
            None => false,
        };

        // Modified entities may pass through their provisioning statuses again
        let entity = match R::provisioning() {
            Some(targets) if modified => {
                let poll = PollSpec::new(targets.pending, targets.target, self.timeouts.update)
                    .with_timing(self.timing.clone());
                match self.wait(&poll, Operation::Update, id).await? {
                    PollOutcome::Reached(entity) => entity,
                    PollOutcome::Gone => {
                        return Err(ReconcileError::NotFound {
                            context: context::<R>(Operation::Update, id),
                        });
                    }
                }
            }
            _ => self.fetch(Operation::Update, id).await?,
        };
        let state = self.decode(Operation::Update, &entity, Some(desired))?;
        tracing::info!(kind = R::KIND, id, "updated");
        Ok(state)
    }

    /// Run one add-column job per new column, strictly in sequence
    ///
    /// All jobs share one create timeout budget.
    async fn add_columns(
        &self,
        id: &str,
        desired: &R::Spec,
        additions: BTreeMap<String, ColumnDescriptor>,
    ) -> Result<()> {
        let jobs = self
            .jobs
            .as_deref()
            .ok_or_else(|| ReconcileError::MissingJobApi {
                context: context::<R>(Operation::AddColumn, id),
            })?;

        let current = self.fetch(Operation::AddColumn, id).await?;
        let current = self.decode(Operation::AddColumn, &current, Some(desired))?;
        let pool_id = R::column_target(&current).ok_or_else(|| ReconcileError::Failure {
            context: context::<R>(Operation::AddColumn, id),
            message: "no data pool receives columns for this resource".to_string(),
        })?;
        let existing = R::state_schema(&current);
        let deadline = Instant::now() + self.timeouts.create;

        for (name, column) in additions {
            // A column left behind by an earlier timed-out run
            if existing.is_some_and(|schema| schema.contains(&name)) {
                tracing::debug!(kind = R::KIND, id, column = %name, "column already present");
                continue;
            }

            tracing::info!(kind = R::KIND, id, pool = pool_id, column = %name, "adding column");
            let job_context = || context::<R>(Operation::AddColumn, pool_id);
            let job = jobs
                .create_add_column_job(pool_id, &column)
                .await
                .map_err(|source| ReconcileError::Client {
                    context: job_context(),
                    source,
                })?;

            let poll = PollSpec::new(
                vec![JobStatus::Created, JobStatus::InProgress],
                vec![JobStatus::Succeeded, JobStatus::Failed],
                deadline.saturating_duration_since(Instant::now()),
            )
            .with_timing(self.timing.clone());

            let job_id = job.id.as_str();
            let outcome = wait_for(&poll, &self.cancel, move || jobs.get_add_column_job(job_id))
                .await
                .map_err(|e| poll_failure(job_context(), e))?;

            match outcome {
                PollOutcome::Reached(job) if job.status == JobStatus::Failed => {
                    return Err(ReconcileError::Failure {
                        context: job_context(),
                        message: job
                            .error_message()
                            .unwrap_or("add column job failed")
                            .to_string(),
                    });
                }
                PollOutcome::Reached(_) => {
                    tracing::debug!(kind = R::KIND, id, column = %name, "column added");
                }
                PollOutcome::Gone => {
                    return Err(ReconcileError::Client {
                        context: job_context(),
                        source: ClientError::NotFound(job.id.clone()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Delete the entity and wait until it is gone
    ///
    /// An entity that no longer exists counts as deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!(kind = R::KIND, id, "deleting");
        match self.api.delete(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(kind = R::KIND, id, "already deleted");
                return Ok(());
            }
            Err(source) => {
                return Err(ReconcileError::Client {
                    context: context::<R>(Operation::Delete, id),
                    source,
                });
            }
        }

        if let Some(pending) = R::teardown() {
            let poll =
                PollSpec::deletion(pending, self.timeouts.delete).with_timing(self.timing.clone());
            self.wait(&poll, Operation::Delete, id).await?;
        }

        tracing::info!(kind = R::KIND, id, "deleted");
        Ok(())
    }

    /// Change needed to move from `deployed` to `desired`
    pub fn plan(&self, deployed: Option<&Deployed<R>>, desired: Option<&R::Spec>) -> Change<R> {
        Change::between(deployed, desired)
    }

    /// Execute a planned change
    pub async fn apply(&self, change: Change<R>) -> Result<ApplyOutcome<R>> {
        match change {
            Change::Create { desired } => self.create(&desired).await.map(ApplyOutcome::Applied),
            Change::Update {
                id, prior, desired, ..
            } => self
                .update(&id, &prior, &desired)
                .await
                .map(ApplyOutcome::Applied),
            Change::Replace { id, desired, .. } => {
                tracing::info!(kind = R::KIND, id = %id, "replacing");
                self.delete(&id).await?;
                self.create(&desired).await.map(ApplyOutcome::Applied)
            }
            Change::Delete { id } => self.delete(&id).await.map(|()| ApplyOutcome::Deleted),
            Change::NoOp { .. } => Ok(ApplyOutcome::Unchanged),
        }
    }
}
