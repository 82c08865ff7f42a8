//! Data source lifecycle tests against scripted clients

use poolflow_cloud::model::{
    AddColumnJob, BasicAuth, ColumnDescriptor, ColumnType, ConnectionSettings, DataSourceStatus,
    JobStatus, WebhookSettings,
};
use poolflow_cloud::resources::DataSourceSpec;
use poolflow_cloud::resources::data_source::DataSourceEntity;
use poolflow_cloud::testing::{Call, ScriptedApi, ScriptedJobs, init_tracing};
use poolflow_cloud::{CreateResponse, DataSource, ReconcileError, Reconciler};
use serde_json::{Value, json};
use std::sync::Arc;

fn ts() -> ColumnDescriptor {
    ColumnDescriptor::new("ts", ColumnType::Timestamp, false)
}

fn webhook(columns: Vec<ColumnDescriptor>) -> DataSourceSpec {
    DataSourceSpec::new(ConnectionSettings::Webhook(WebhookSettings {
        basic_auth: Some(BasicAuth {
            username: "hook".to_string(),
            password: "s3cret".to_string(),
        }),
        columns: columns.into(),
        timestamp: Some("ts".to_string()),
        tenant: None,
        unique_id: None,
    }))
    .named("events")
}

fn entity(status: &str, columns: &[ColumnDescriptor], pool: Option<&str>) -> DataSourceEntity {
    let columns: Vec<_> = columns
        .iter()
        .map(|c| {
            json!({
                "columnName": c.name,
                "type": c.column_type.as_str(),
                "isNullable": c.nullable,
            })
        })
        .collect();
    let pools: Vec<Value> = pool.into_iter().map(|id| json!({ "id": id })).collect();

    serde_json::from_value(json!({
        "id": "DSO04",
        "uniqueName": "events",
        "type": "WEBHOOK",
        "status": status,
        "error": if status == "BROKEN" { json!({ "message": "basic auth rejected" }) } else { json!(null) },
        "dataPools": pools,
        "connectionSettings": {
            "__typename": "WebhookConnectionSettings",
            "basicAuth": { "username": "hook" },
            "timestamp": "ts",
            "webhookUrl": "https://webhooks.us-east-2.propeldata.com/v1/WHK04",
            "columns": columns
        }
    }))
    .unwrap()
}

fn job(status: JobStatus) -> AddColumnJob {
    AddColumnJob {
        id: "JOB04".to_string(),
        status,
        error: None,
    }
}

fn reconciler(api: &Arc<ScriptedApi<DataSource>>, jobs: &Arc<ScriptedJobs>) -> Reconciler<DataSource> {
    init_tracing();
    Reconciler::new(api.clone()).with_jobs(jobs.clone())
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_connected() {
    let api = Arc::new(
        ScriptedApi::<DataSource>::new()
            .on_create(Ok(CreateResponse::Created(entity("CREATED", &[ts()], None))))
            .on_get(Ok(entity("CONNECTING", &[ts()], None)))
            .on_get(Ok(entity("CONNECTED", &[ts()], Some("DPO04")))),
    );
    let jobs = Arc::new(ScriptedJobs::new());

    let state = reconciler(&api, &jobs)
        .create(&webhook(vec![ts()]))
        .await
        .unwrap();

    assert_eq!(state.status, DataSourceStatus::Connected);
    assert_eq!(state.data_pool_id.as_deref(), Some("DPO04"));
    assert_eq!(
        state.webhook_url.as_deref(),
        Some("https://webhooks.us-east-2.propeldata.com/v1/WHK04")
    );
    // The password is never echoed back and survives from the local spec
    match &state.settings {
        ConnectionSettings::Webhook(w) => {
            assert_eq!(w.basic_auth.as_ref().map(|a| a.password.as_str()), Some("s3cret"));
        }
        other => panic!("unexpected settings {other:?}"),
    }
    assert_eq!(api.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_broken_source_reports_server_message() {
    let api = Arc::new(
        ScriptedApi::<DataSource>::new()
            .on_create(Ok(CreateResponse::Created(entity("CREATED", &[ts()], None))))
            .on_get(Ok(entity("BROKEN", &[ts()], None))),
    );
    let jobs = Arc::new(ScriptedJobs::new());

    let err = reconciler(&api, &jobs)
        .create(&webhook(vec![ts()]))
        .await
        .unwrap_err();

    match &err {
        ReconcileError::Failure { message, .. } => {
            assert!(message.contains("basic auth rejected"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(api.calls(), vec![Call::Create, Call::Get("DSO04".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_update_adds_webhook_columns_to_its_pool() {
    let amount = ColumnDescriptor::new("amount", ColumnType::Float, true);
    let api = Arc::new(
        ScriptedApi::<DataSource>::new()
            .on_get(Ok(entity("CONNECTED", &[ts()], Some("DPO04"))))
            .on_get(Ok(entity("CONNECTED", &[ts(), amount.clone()], Some("DPO04")))),
    );
    let jobs = Arc::new(
        ScriptedJobs::new()
            .on_create(Ok(job(JobStatus::Created)))
            .on_get(Ok(job(JobStatus::Succeeded))),
    );

    let state = reconciler(&api, &jobs)
        .update("DSO04", &webhook(vec![ts()]), &webhook(vec![ts(), amount.clone()]))
        .await
        .unwrap();

    assert_eq!(
        jobs.calls(),
        vec![
            Call::CreateJob {
                pool_id: "DPO04".to_string(),
                column: "amount".to_string()
            },
            Call::GetJob("JOB04".to_string()),
        ]
    );
    assert_eq!(jobs.columns(), vec![amount]);
    // Only the schema changed, so no modify call is made
    assert!(!api.calls().contains(&Call::Modify));
    match &state.settings {
        ConnectionSettings::Webhook(w) => assert!(w.columns.contains("amount")),
        other => panic!("unexpected settings {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_without_pool_cannot_add_columns() {
    let amount = ColumnDescriptor::new("amount", ColumnType::Float, true);
    let api = Arc::new(ScriptedApi::<DataSource>::new().on_get(Ok(entity("CONNECTED", &[ts()], None))));
    let jobs = Arc::new(ScriptedJobs::new());

    let err = reconciler(&api, &jobs)
        .update("DSO04", &webhook(vec![ts()]), &webhook(vec![ts(), amount]))
        .await
        .unwrap_err();

    match &err {
        ReconcileError::Failure { message, .. } => {
            assert_eq!(message, "no data pool receives columns for this resource");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(jobs.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_rejects_removed_webhook_column() {
    let api = Arc::new(ScriptedApi::<DataSource>::new());
    let jobs = Arc::new(ScriptedJobs::new());
    let amount = ColumnDescriptor::new("amount", ColumnType::Float, true);

    let err = reconciler(&api, &jobs)
        .update("DSO04", &webhook(vec![ts(), amount]), &webhook(vec![ts()]))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::SchemaEvolution { .. }), "{err:?}");
    assert!(api.calls().is_empty());
    assert!(jobs.calls().is_empty());
}
