//! Data sources: connections to external systems feeding data pools

use crate::change::{ChangeSet, Desired};
use crate::codec::{
    self, IdRef, RemoteColumn, carry_secret, decode_columns, optional_text, text_if_changed,
};
use crate::error::{CodecError, ValidationError};
use crate::model::{
    BasicAuth, ClickHouseSettings, ConnectionSettings, DataSourceStatus, DataSourceType,
    HttpSettings, HttpTable, KafkaAuthType, KafkaSettings, RemoteErrorDetail, S3Settings, S3Table,
    SnowflakeSettings, TableSchema, WebhookSettings,
};
use crate::poller::Observation;
use crate::resource::{Resource, StatusTargets};
use serde::{Deserialize, Serialize};

/// Data source resource type
pub struct DataSource;

/// Desired state of a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSpec {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub settings: ConnectionSettings,
}

impl DataSourceSpec {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            unique_name: None,
            description: None,
            settings,
        }
    }

    pub fn named(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = Some(unique_name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataSourceField {
    UniqueName,
    Description,
    Kind,
    Settings,
    WebhookLayout,
    Columns,
}

impl std::fmt::Display for DataSourceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceField::UniqueName => write!(f, "unique_name"),
            DataSourceField::Description => write!(f, "description"),
            DataSourceField::Kind => write!(f, "type"),
            DataSourceField::Settings => write!(f, "connection_settings"),
            DataSourceField::WebhookLayout => write!(f, "webhook timestamp/tenant/unique_id"),
            DataSourceField::Columns => write!(f, "columns"),
        }
    }
}

impl Desired for DataSourceSpec {
    type Field = DataSourceField;

    fn label(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    fn changed_fields(&self, prior: &Self) -> ChangeSet<DataSourceField> {
        ChangeSet::new()
            .track(DataSourceField::UniqueName, &self.unique_name, &prior.unique_name)
            .track(DataSourceField::Description, &self.description, &prior.description)
            .track(DataSourceField::Kind, &self.settings.kind(), &prior.settings.kind())
            .track(
                DataSourceField::Settings,
                &self.settings.without_columns(),
                &prior.settings.without_columns(),
            )
            .track(
                DataSourceField::WebhookLayout,
                &self.settings.webhook_layout(),
                &prior.settings.webhook_layout(),
            )
            .track(
                DataSourceField::Columns,
                &self.settings.table_schema(),
                &prior.settings.table_schema(),
            )
    }

    fn requires_replacement(field: DataSourceField) -> bool {
        matches!(field, DataSourceField::Kind | DataSourceField::WebhookLayout)
    }

    fn schema_field() -> Option<DataSourceField> {
        Some(DataSourceField::Columns)
    }
}

/// Normalized state of a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceState {
    pub id: String,
    pub unique_name: String,
    pub description: Option<String>,
    pub kind: DataSourceType,
    pub status: DataSourceStatus,
    pub settings: ConnectionSettings,
    /// Generated ingestion endpoint of a webhook source
    pub webhook_url: Option<String>,
    /// Data pool a webhook source writes into
    pub data_pool_id: Option<String>,
}

// ============ Wire types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDataSourceInput {
    #[serde(skip)]
    pub kind: DataSourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(serialize_with = "codec::settings_wire")]
    pub connection_settings: ConnectionSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyDataSourceInput {
    #[serde(skip)]
    pub kind: DataSourceType,
    pub id_or_unique_name: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "codec::settings_wire_opt"
    )]
    pub connection_settings: Option<ConnectionSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceEntity {
    pub id: String,
    pub unique_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub data_source_type: DataSourceType,
    pub status: DataSourceStatus,
    #[serde(default)]
    pub error: Option<RemoteErrorDetail>,
    pub connection_settings: RemoteConnectionSettings,
    #[serde(default)]
    pub data_pools: Vec<IdRef>,
}

impl Observation for DataSourceEntity {
    type Status = DataSourceStatus;

    fn status(&self) -> DataSourceStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.message.clone())
    }
}

/// Connection settings as echoed by the server, secrets omitted
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum RemoteConnectionSettings {
    #[serde(rename = "SnowflakeConnectionSettings")]
    Snowflake(RemoteSnowflake),
    #[serde(rename = "S3ConnectionSettings")]
    S3(RemoteS3),
    #[serde(rename = "HttpConnectionSettings")]
    Http(RemoteHttp),
    #[serde(rename = "KafkaConnectionSettings")]
    Kafka(RemoteKafka),
    #[serde(rename = "WebhookConnectionSettings")]
    Webhook(RemoteWebhook),
    #[serde(rename = "ClickHouseConnectionSettings")]
    ClickHouse(RemoteClickHouse),
    #[serde(other)]
    Unsupported,
}

impl RemoteConnectionSettings {
    pub fn kind(&self) -> Option<DataSourceType> {
        match self {
            RemoteConnectionSettings::Snowflake(_) => Some(DataSourceType::Snowflake),
            RemoteConnectionSettings::S3(_) => Some(DataSourceType::S3),
            RemoteConnectionSettings::Http(_) => Some(DataSourceType::Http),
            RemoteConnectionSettings::Kafka(_) => Some(DataSourceType::Kafka),
            RemoteConnectionSettings::Webhook(_) => Some(DataSourceType::Webhook),
            RemoteConnectionSettings::ClickHouse(_) => Some(DataSourceType::ClickHouse),
            RemoteConnectionSettings::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnowflake {
    pub account: String,
    pub database: String,
    pub warehouse: String,
    pub schema: String,
    pub role: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTable {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub columns: Vec<RemoteColumn>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteS3 {
    pub bucket: String,
    pub aws_access_key_id: String,
    #[serde(default)]
    pub tables: Vec<RemoteTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBasicAuth {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHttp {
    #[serde(default)]
    pub basic_auth: Option<RemoteBasicAuth>,
    #[serde(default)]
    pub tables: Vec<RemoteTable>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteKafka {
    pub bootstrap_servers: Vec<String>,
    pub auth: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWebhook {
    #[serde(default)]
    pub basic_auth: Option<RemoteBasicAuth>,
    #[serde(default)]
    pub columns: Vec<RemoteColumn>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteClickHouse {
    pub url: String,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub readonly: bool,
}

// ============ Codec ============

fn carry_basic_auth(remote: &Option<RemoteBasicAuth>, local: Option<&BasicAuth>) -> Option<BasicAuth> {
    remote.as_ref().map(|auth| BasicAuth {
        username: auth.username.clone(),
        password: carry_secret(local.map(|l| l.password.as_str())),
    })
}

fn decode_tables(remote: &[RemoteTable]) -> Result<Vec<(String, Option<String>, TableSchema)>, CodecError> {
    remote
        .iter()
        .map(|t| Ok((t.name.clone(), t.path.clone(), decode_columns(&t.columns)?)))
        .collect()
}

/// Rebuild domain settings from the server copy, carrying secrets from `local`
fn decode_settings(
    remote: &RemoteConnectionSettings,
    local: Option<&ConnectionSettings>,
) -> Result<ConnectionSettings, CodecError> {
    let settings = match remote {
        RemoteConnectionSettings::Snowflake(r) => {
            let password = match local {
                Some(ConnectionSettings::Snowflake(l)) => Some(l.password.as_str()),
                _ => None,
            };
            ConnectionSettings::Snowflake(SnowflakeSettings {
                account: r.account.clone(),
                database: r.database.clone(),
                warehouse: r.warehouse.clone(),
                schema: r.schema.clone(),
                role: r.role.clone(),
                username: r.username.clone(),
                password: carry_secret(password),
            })
        }
        RemoteConnectionSettings::S3(r) => {
            let secret = match local {
                Some(ConnectionSettings::S3(l)) => Some(l.aws_secret_access_key.as_str()),
                _ => None,
            };
            ConnectionSettings::S3(S3Settings {
                bucket: r.bucket.clone(),
                aws_access_key_id: r.aws_access_key_id.clone(),
                aws_secret_access_key: carry_secret(secret),
                tables: decode_tables(&r.tables)?
                    .into_iter()
                    .map(|(name, path, columns)| S3Table { name, path, columns })
                    .collect(),
            })
        }
        RemoteConnectionSettings::Http(r) => {
            let auth = match local {
                Some(ConnectionSettings::Http(l)) => l.basic_auth.as_ref(),
                _ => None,
            };
            ConnectionSettings::Http(HttpSettings {
                basic_auth: carry_basic_auth(&r.basic_auth, auth),
                tables: decode_tables(&r.tables)?
                    .into_iter()
                    .map(|(name, _, columns)| HttpTable { name, columns })
                    .collect(),
            })
        }
        RemoteConnectionSettings::Kafka(r) => {
            let password = match local {
                Some(ConnectionSettings::Kafka(l)) => l.password.clone(),
                _ => None,
            };
            let auth: KafkaAuthType = r.auth.parse().map_err(|_| CodecError::UnknownValue {
                field: "kafka auth type",
                value: r.auth.clone(),
            })?;
            ConnectionSettings::Kafka(KafkaSettings {
                bootstrap_servers: r.bootstrap_servers.clone(),
                auth,
                user: r.user.clone(),
                password,
                tls: r.tls,
            })
        }
        RemoteConnectionSettings::Webhook(r) => {
            let auth = match local {
                Some(ConnectionSettings::Webhook(l)) => l.basic_auth.as_ref(),
                _ => None,
            };
            ConnectionSettings::Webhook(WebhookSettings {
                basic_auth: carry_basic_auth(&r.basic_auth, auth),
                columns: decode_columns(&r.columns)?,
                timestamp: r.timestamp.clone(),
                tenant: r.tenant.clone(),
                unique_id: r.unique_id.clone(),
            })
        }
        RemoteConnectionSettings::ClickHouse(r) => {
            let password = match local {
                Some(ConnectionSettings::ClickHouse(l)) => Some(l.password.as_str()),
                _ => None,
            };
            ConnectionSettings::ClickHouse(ClickHouseSettings {
                url: r.url.clone(),
                database: r.database.clone(),
                user: r.user.clone(),
                password: carry_secret(password),
                readonly: r.readonly,
            })
        }
        RemoteConnectionSettings::Unsupported => {
            return Err(CodecError::MissingField("connection settings"));
        }
    };
    Ok(settings)
}

impl Resource for DataSource {
    const KIND: &'static str = "data source";

    type Spec = DataSourceSpec;
    type State = DataSourceState;
    type Entity = DataSourceEntity;
    type CreateInput = CreateDataSourceInput;
    type ModifyInput = ModifyDataSourceInput;

    fn validate(spec: &DataSourceSpec) -> Result<(), ValidationError> {
        spec.settings.validate()
    }

    fn encode_create(spec: &DataSourceSpec) -> Result<CreateDataSourceInput, ValidationError> {
        Ok(CreateDataSourceInput {
            kind: spec.settings.kind(),
            unique_name: spec.unique_name.clone(),
            description: spec.description.clone(),
            connection_settings: spec.settings.clone(),
        })
    }

    fn encode_modify(
        id: &str,
        _prior: &DataSourceSpec,
        desired: &DataSourceSpec,
        changes: &ChangeSet<DataSourceField>,
    ) -> Result<Option<ModifyDataSourceInput>, ValidationError> {
        let unique_name = changes
            .has_changed(DataSourceField::UniqueName)
            .then(|| desired.unique_name.clone())
            .flatten();
        let description = text_if_changed(changes, DataSourceField::Description, &desired.description);
        let connection_settings = changes
            .has_changed(DataSourceField::Settings)
            .then(|| desired.settings.without_columns());

        if unique_name.is_none() && description.is_none() && connection_settings.is_none() {
            return Ok(None);
        }

        Ok(Some(ModifyDataSourceInput {
            kind: desired.settings.kind(),
            id_or_unique_name: IdRef::new(id),
            unique_name,
            description,
            connection_settings,
        }))
    }

    fn decode(
        entity: &DataSourceEntity,
        local: Option<&DataSourceSpec>,
    ) -> Result<DataSourceState, CodecError> {
        let declared = entity.data_source_type;
        let found = entity
            .connection_settings
            .kind()
            .ok_or(CodecError::UnsupportedSettings { kind: declared })?;
        if found != declared {
            return Err(CodecError::SettingsMismatch {
                expected: declared,
                found,
            });
        }

        let local_settings = local.map(|spec| &spec.settings);
        if let Some(expected) = local_settings.map(ConnectionSettings::kind)
            && expected != declared
        {
            return Err(CodecError::SettingsMismatch {
                expected,
                found: declared,
            });
        }

        let settings = decode_settings(&entity.connection_settings, local_settings)?;
        let webhook_url = match &entity.connection_settings {
            RemoteConnectionSettings::Webhook(w) => Some(w.webhook_url.clone()),
            _ => None,
        };

        Ok(DataSourceState {
            id: entity.id.clone(),
            unique_name: entity.unique_name.clone(),
            description: optional_text(&entity.description),
            kind: declared,
            status: entity.status,
            settings,
            webhook_url,
            data_pool_id: entity.data_pools.first().map(|p| p.id.clone()),
        })
    }

    fn entity_id(entity: &DataSourceEntity) -> &str {
        &entity.id
    }

    fn state_id(state: &DataSourceState) -> &str {
        &state.id
    }

    fn provisioning() -> Option<StatusTargets<DataSourceStatus>> {
        Some(StatusTargets::new(
            vec![
                DataSourceStatus::Created,
                DataSourceStatus::Pending,
                DataSourceStatus::Connecting,
            ],
            vec![DataSourceStatus::Connected],
        ))
    }

    fn teardown() -> Option<Vec<DataSourceStatus>> {
        Some(vec![
            DataSourceStatus::Deleting,
            DataSourceStatus::Created,
            DataSourceStatus::Pending,
            DataSourceStatus::Connecting,
            DataSourceStatus::Connected,
            DataSourceStatus::Broken,
        ])
    }

    fn table_schema(spec: &DataSourceSpec) -> Option<&TableSchema> {
        spec.settings.table_schema()
    }

    fn state_schema(state: &DataSourceState) -> Option<&TableSchema> {
        state.settings.table_schema()
    }

    fn column_target(state: &DataSourceState) -> Option<&str> {
        state.data_pool_id.as_deref()
    }
}
