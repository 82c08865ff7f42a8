//! Remote operation clients for every resource type

use crate::client::{Payload, PropelClient};
use crate::error::PropelError;
use crate::queries::{self, EntityDoc};
use async_trait::async_trait;
use poolflow_cloud::model::{AddColumnJob, ColumnDescriptor, ColumnType, DataSourceType};
use poolflow_cloud::resources::data_pool::{CreateDataPoolInput, DataPoolEntity, ModifyDataPoolInput};
use poolflow_cloud::resources::data_source::{
    CreateDataSourceInput, DataSourceEntity, ModifyDataSourceInput,
};
use poolflow_cloud::resources::materialized_view::{
    CreateMaterializedViewInput, MaterializedViewEntity, ModifyMaterializedViewInput,
};
use poolflow_cloud::resources::metric::{
    CreateMetricInput, MetricEntity, MetricType, ModifyMetricInput,
};
use poolflow_cloud::resources::policy::{CreatePolicyInput, ModifyPolicyInput, PolicyEntity};
use poolflow_cloud::{
    ClientError, CreateResponse, DataPool, DataSource, JobApi, MaterializedView, Metric, Policy,
    ResourceApi,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

type ClientResult<T> = Result<T, ClientError>;

fn input_variables<T: Serialize>(input: &T) -> ClientResult<Value> {
    let input = serde_json::to_value(input).map_err(PropelError::from)?;
    Ok(json!({ "input": input }))
}

/// Type name used in data source mutation names
fn data_source_name(kind: DataSourceType) -> &'static str {
    match kind {
        DataSourceType::Snowflake => "Snowflake",
        DataSourceType::S3 => "S3",
        DataSourceType::Http => "Http",
        DataSourceType::Kafka => "Kafka",
        DataSourceType::Webhook => "Webhook",
        DataSourceType::ClickHouse => "ClickHouse",
    }
}

/// Type name used in metric mutation names
fn metric_name(metric_type: MetricType) -> &'static str {
    match metric_type {
        MetricType::Count => "Count",
        MetricType::Sum => "Sum",
        MetricType::CountDistinct => "CountDistinct",
        MetricType::Average => "Average",
        MetricType::Min => "Min",
        MetricType::Max => "Max",
        MetricType::Custom => "Custom",
    }
}

impl PropelClient {
    async fn get_entity<E: DeserializeOwned>(&self, doc: &EntityDoc, id: &str) -> ClientResult<E> {
        self.fetch(doc.field, &queries::get(doc), json!({ "id": id }), id)
            .await
    }

    async fn create_entity<E: DeserializeOwned, I: Serialize>(
        &self,
        name: &str,
        doc: &EntityDoc,
        input: &I,
    ) -> ClientResult<CreateResponse<E>> {
        let input_type = format!("{}Input", capitalize(name));
        let payload: Payload<E> = self
            .mutate(name, &queries::mutation(name, &input_type, doc), input_variables(input)?)
            .await?;
        payload.into_created()
    }

    async fn modify_entity<E: DeserializeOwned, I: Serialize>(
        &self,
        name: &str,
        doc: &EntityDoc,
        input: &I,
    ) -> ClientResult<E> {
        let input_type = format!("{}Input", capitalize(name));
        let payload: Payload<E> = self
            .mutate(name, &queries::mutation(name, &input_type, doc), input_variables(input)?)
            .await?;
        payload.into_entity()
    }

    async fn delete_entity(&self, name: &str, id: &str) -> ClientResult<()> {
        self.graphql::<Value>(name, &queries::by_id(name), json!({ "id": id }))
            .await?;
        Ok(())
    }

    async fn assign_policy(&self, name: &str, policy: &str, application: &str) -> ClientResult<()> {
        tracing::debug!(policy, application, "{name}");
        self.graphql::<Value>(
            name,
            &queries::assign_policy(name),
            json!({ "policy": policy, "application": application }),
        )
        .await?;
        Ok(())
    }
}

/// `createDataPoolV2` -> `CreateDataPoolV2`
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl ResourceApi<DataSource> for PropelClient {
    async fn create(&self, input: CreateDataSourceInput) -> ClientResult<CreateResponse<DataSourceEntity>> {
        let name = format!("create{}DataSource", data_source_name(input.kind));
        self.create_entity(&name, &queries::DATA_SOURCE, &input).await
    }

    async fn get(&self, id: &str) -> ClientResult<DataSourceEntity> {
        self.get_entity(&queries::DATA_SOURCE, id).await
    }

    async fn modify(&self, input: ModifyDataSourceInput) -> ClientResult<DataSourceEntity> {
        let name = format!("modify{}DataSource", data_source_name(input.kind));
        self.modify_entity(&name, &queries::DATA_SOURCE, &input).await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delete_entity("deleteDataSource", id).await
    }
}

#[async_trait]
impl ResourceApi<DataPool> for PropelClient {
    async fn create(&self, input: CreateDataPoolInput) -> ClientResult<CreateResponse<DataPoolEntity>> {
        self.create_entity("createDataPoolV2", &queries::DATA_POOL, &input)
            .await
    }

    async fn get(&self, id: &str) -> ClientResult<DataPoolEntity> {
        self.get_entity(&queries::DATA_POOL, id).await
    }

    async fn modify(&self, input: ModifyDataPoolInput) -> ClientResult<DataPoolEntity> {
        self.modify_entity("modifyDataPool", &queries::DATA_POOL, &input)
            .await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delete_entity("deleteDataPool", id).await
    }
}

#[async_trait]
impl ResourceApi<MaterializedView> for PropelClient {
    async fn create(
        &self,
        input: CreateMaterializedViewInput,
    ) -> ClientResult<CreateResponse<MaterializedViewEntity>> {
        self.create_entity("createMaterializedView", &queries::MATERIALIZED_VIEW, &input)
            .await
    }

    async fn get(&self, id: &str) -> ClientResult<MaterializedViewEntity> {
        self.get_entity(&queries::MATERIALIZED_VIEW, id).await
    }

    async fn modify(&self, input: ModifyMaterializedViewInput) -> ClientResult<MaterializedViewEntity> {
        self.modify_entity("modifyMaterializedView", &queries::MATERIALIZED_VIEW, &input)
            .await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delete_entity("deleteMaterializedView", id).await
    }
}

#[async_trait]
impl ResourceApi<Metric> for PropelClient {
    async fn create(&self, input: CreateMetricInput) -> ClientResult<CreateResponse<MetricEntity>> {
        let name = format!("create{}Metric", metric_name(input.metric_type));
        self.create_entity(&name, &queries::METRIC, &input).await
    }

    async fn get(&self, id: &str) -> ClientResult<MetricEntity> {
        self.get_entity(&queries::METRIC, id).await
    }

    async fn modify(&self, input: ModifyMetricInput) -> ClientResult<MetricEntity> {
        self.modify_entity("modifyMetric", &queries::METRIC, &input)
            .await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delete_entity("deleteMetric", id).await
    }
}

/// Report a failed assignment against a policy that already exists remotely
fn assignment_failed(policy: &str, application: &str, error: ClientError) -> ClientError {
    let message = format!(
        "policy {policy} was created but assigning it to application {application} failed: {error}"
    );
    match error {
        ClientError::Transport(_) => ClientError::Transport(message),
        ClientError::NotFound(_) | ClientError::Other(_) => ClientError::Other(message),
    }
}

#[async_trait]
impl ResourceApi<Policy> for PropelClient {
    /// Creates the policy, then assigns it to each application.
    ///
    /// A failed assignment leaves the created policy in place; the error
    /// names its ID so it can be adopted or deleted.
    async fn create(&self, input: CreatePolicyInput) -> ClientResult<CreateResponse<PolicyEntity>> {
        let policy = match self
            .create_entity::<PolicyEntity, _>("createPolicy", &queries::POLICY, &input)
            .await?
        {
            CreateResponse::Created(policy) => policy,
            failed => return Ok(failed),
        };
        if input.assign.is_empty() {
            return Ok(CreateResponse::Created(policy));
        }

        for application in &input.assign {
            if let Err(e) = self
                .assign_policy("assignPolicyToApplication", &policy.id, application)
                .await
            {
                tracing::warn!(policy = %policy.id, application, error = %e, "policy assignment failed");
                return Err(assignment_failed(&policy.id, application, e));
            }
        }
        let policy = self.get_entity(&queries::POLICY, &policy.id).await?;
        Ok(CreateResponse::Created(policy))
    }

    async fn get(&self, id: &str) -> ClientResult<PolicyEntity> {
        self.get_entity(&queries::POLICY, id).await
    }

    async fn modify(&self, input: ModifyPolicyInput) -> ClientResult<PolicyEntity> {
        if input.modifies_policy() {
            self.modify_entity::<PolicyEntity, _>("modifyPolicy", &queries::POLICY, &input)
                .await?;
        }
        for application in &input.assign {
            self.assign_policy("assignPolicyToApplication", &input.id, application)
                .await?;
        }
        for application in &input.unassign {
            self.assign_policy("unassignPolicyFromApplication", &input.id, application)
                .await?;
        }
        self.get_entity(&queries::POLICY, &input.id).await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delete_entity("deletePolicy", id).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddColumnInput<'a> {
    data_pool: &'a str,
    column_name: &'a str,
    column_type: ColumnType,
    is_nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_property: Option<&'a str>,
}

impl<'a> AddColumnInput<'a> {
    fn new(pool_id: &'a str, column: &'a ColumnDescriptor) -> Self {
        Self {
            data_pool: pool_id,
            column_name: &column.name,
            column_type: column.column_type,
            is_nullable: column.nullable,
            json_property: column.json_path.as_deref(),
        }
    }
}

#[async_trait]
impl JobApi for PropelClient {
    async fn create_add_column_job(
        &self,
        pool_id: &str,
        column: &ColumnDescriptor,
    ) -> ClientResult<AddColumnJob> {
        let input = AddColumnInput::new(pool_id, column);
        self.mutate(
            "createAddColumnToDataPoolJob",
            &queries::create_add_column_job(),
            input_variables(&input)?,
        )
        .await
    }

    async fn get_add_column_job(&self, id: &str) -> ClientResult<AddColumnJob> {
        self.fetch(
            "addColumnToDataPoolJob",
            &queries::get_add_column_job(),
            json!({ "id": id }),
            id,
        )
        .await
    }
}
