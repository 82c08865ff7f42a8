//! Connection settings, one closed variant per data source kind

use crate::error::ValidationError;
use crate::model::schema::TableSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Kind of external system a data source connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceType {
    Snowflake,
    S3,
    Http,
    Kafka,
    Webhook,
    #[serde(rename = "CLICKHOUSE")]
    ClickHouse,
}

impl DataSourceType {
    pub const ALL: [DataSourceType; 6] = [
        DataSourceType::Snowflake,
        DataSourceType::S3,
        DataSourceType::Http,
        DataSourceType::Kafka,
        DataSourceType::Webhook,
        DataSourceType::ClickHouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::Snowflake => "SNOWFLAKE",
            DataSourceType::S3 => "S3",
            DataSourceType::Http => "HTTP",
            DataSourceType::Kafka => "KAFKA",
            DataSourceType::Webhook => "WEBHOOK",
            DataSourceType::ClickHouse => "CLICKHOUSE",
        }
    }
}

impl std::fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "data source type",
                value: s.to_string(),
            })
    }
}

/// Username/password pair for basic authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowflakeSettings {
    pub account: String,
    pub database: String,
    pub warehouse: String,
    pub schema: String,
    pub role: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Table {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub columns: TableSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Settings {
    pub bucket: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    #[serde(default)]
    pub tables: Vec<S3Table>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTable {
    pub name: String,
    pub columns: TableSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub tables: Vec<HttpTable>,
}

/// SASL mechanism used by a Kafka connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KafkaAuthType {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "PLAIN")]
    Plain,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl KafkaAuthType {
    pub const ALL: [KafkaAuthType; 4] = [
        KafkaAuthType::None,
        KafkaAuthType::Plain,
        KafkaAuthType::ScramSha256,
        KafkaAuthType::ScramSha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KafkaAuthType::None => "NONE",
            KafkaAuthType::Plain => "PLAIN",
            KafkaAuthType::ScramSha256 => "SCRAM-SHA-256",
            KafkaAuthType::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl std::fmt::Display for KafkaAuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KafkaAuthType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KafkaAuthType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "kafka auth type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSettings {
    pub bootstrap_servers: Vec<String>,
    pub auth: KafkaAuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default, skip_serializing_if = "TableSchema::is_empty")]
    pub columns: TableSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickHouseSettings {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub readonly: bool,
}

/// Connection settings of a data source
///
/// Exactly one variant per [`DataSourceType`]; the variant doubles as the
/// source's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionSettings {
    Snowflake(SnowflakeSettings),
    S3(S3Settings),
    Http(HttpSettings),
    Kafka(KafkaSettings),
    Webhook(WebhookSettings),
    #[serde(rename = "CLICKHOUSE")]
    ClickHouse(ClickHouseSettings),
}

impl ConnectionSettings {
    pub fn kind(&self) -> DataSourceType {
        match self {
            ConnectionSettings::Snowflake(_) => DataSourceType::Snowflake,
            ConnectionSettings::S3(_) => DataSourceType::S3,
            ConnectionSettings::Http(_) => DataSourceType::Http,
            ConnectionSettings::Kafka(_) => DataSourceType::Kafka,
            ConnectionSettings::Webhook(_) => DataSourceType::Webhook,
            ConnectionSettings::ClickHouse(_) => DataSourceType::ClickHouse,
        }
    }

    /// Evolvable column set, present only for webhook sources
    pub fn table_schema(&self) -> Option<&TableSchema> {
        match self {
            ConnectionSettings::Webhook(webhook) => Some(&webhook.columns),
            _ => None,
        }
    }

    /// Copy with the evolvable column set removed
    ///
    /// Webhook columns change through add-column jobs, never through the
    /// settings mutation.
    pub fn without_columns(&self) -> ConnectionSettings {
        match self {
            ConnectionSettings::Webhook(webhook) => ConnectionSettings::Webhook(WebhookSettings {
                columns: TableSchema::default(),
                ..webhook.clone()
            }),
            other => other.clone(),
        }
    }

    /// Webhook fields fixed at creation time
    pub fn webhook_layout(&self) -> Option<(&Option<String>, &Option<String>, &Option<String>)> {
        match self {
            ConnectionSettings::Webhook(w) => Some((&w.timestamp, &w.tenant, &w.unique_id)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ConnectionSettings::Snowflake(_) | ConnectionSettings::ClickHouse(_) => Ok(()),
            ConnectionSettings::S3(s3) => {
                validate_table_names(s3.tables.iter().map(|t| t.name.as_str()))?;
                s3.tables.iter().try_for_each(|t| t.columns.validate())
            }
            ConnectionSettings::Http(http) => {
                validate_table_names(http.tables.iter().map(|t| t.name.as_str()))?;
                http.tables.iter().try_for_each(|t| t.columns.validate())
            }
            ConnectionSettings::Kafka(kafka) => {
                if kafka.bootstrap_servers.is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "bootstrapServers",
                        variant: DataSourceType::Kafka.to_string(),
                    });
                }
                if kafka.auth != KafkaAuthType::None {
                    if kafka.user.is_none() {
                        return Err(ValidationError::MissingField {
                            field: "user",
                            variant: format!("KAFKA auth {}", kafka.auth),
                        });
                    }
                    if kafka.password.is_none() {
                        return Err(ValidationError::MissingField {
                            field: "password",
                            variant: format!("KAFKA auth {}", kafka.auth),
                        });
                    }
                }
                Ok(())
            }
            ConnectionSettings::Webhook(webhook) => {
                webhook.columns.validate()?;
                if webhook.columns.is_empty() {
                    return Ok(());
                }
                for (field, column) in [
                    ("timestamp", &webhook.timestamp),
                    ("tenant", &webhook.tenant),
                    ("uniqueId", &webhook.unique_id),
                ] {
                    if let Some(column) = column
                        && !webhook.columns.contains(column)
                    {
                        return Err(ValidationError::UnknownColumn {
                            field,
                            column: column.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

fn validate_table_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateTable(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::{ColumnDescriptor, ColumnType};

    fn webhook(columns: Vec<ColumnDescriptor>, timestamp: Option<&str>) -> ConnectionSettings {
        ConnectionSettings::Webhook(WebhookSettings {
            basic_auth: None,
            columns: columns.into(),
            timestamp: timestamp.map(str::to_string),
            tenant: None,
            unique_id: None,
        })
    }

    #[test]
    fn test_kind_matches_variant() {
        let settings = webhook(vec![], None);
        assert_eq!(settings.kind(), DataSourceType::Webhook);
        assert!(settings.table_schema().is_some());
    }

    #[test]
    fn test_config_shape_is_tagged() {
        let settings: ConnectionSettings = serde_json::from_value(serde_json::json!({
            "type": "CLICKHOUSE",
            "url": "https://ch.example.com:8443",
            "database": "events",
            "user": "reader",
            "password": "secret"
        }))
        .unwrap();

        assert_eq!(settings.kind(), DataSourceType::ClickHouse);
    }

    #[test]
    fn test_webhook_timestamp_must_reference_column() {
        let settings = webhook(
            vec![ColumnDescriptor::new("ts", ColumnType::Timestamp, false)],
            Some("created_at"),
        );
        assert_eq!(
            settings.validate().unwrap_err().to_string(),
            "timestamp references unknown column created_at"
        );

        let settings = webhook(
            vec![ColumnDescriptor::new("ts", ColumnType::Timestamp, false)],
            Some("ts"),
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_kafka_auth_requires_credentials() {
        let settings = ConnectionSettings::Kafka(KafkaSettings {
            bootstrap_servers: vec!["broker-1:9092".to_string()],
            auth: KafkaAuthType::ScramSha512,
            user: Some("propel".to_string()),
            password: None,
            tls: true,
        });

        assert_eq!(
            settings.validate().unwrap_err().to_string(),
            "password is required for KAFKA auth SCRAM-SHA-512"
        );
        assert_eq!(
            "SCRAM-SHA-256".parse::<KafkaAuthType>().unwrap(),
            KafkaAuthType::ScramSha256
        );
    }

    #[test]
    fn test_without_columns_strips_webhook_schema() {
        let settings = webhook(
            vec![ColumnDescriptor::new("ts", ColumnType::Timestamp, false)],
            None,
        );
        assert_eq!(
            settings.without_columns().table_schema().map(TableSchema::len),
            Some(0)
        );
    }
}
