//! Domain model shared by every resource type

pub mod filter;
pub mod schema;
pub mod settings;
pub mod status;

pub use filter::{Filter, FilterOperator};
pub use schema::{ColumnDescriptor, ColumnType, TableSchema};
pub use settings::{
    BasicAuth, ClickHouseSettings, ConnectionSettings, DataSourceType, HttpSettings, HttpTable,
    KafkaAuthType, KafkaSettings, S3Settings, S3Table, SnowflakeSettings, WebhookSettings,
};
pub use status::{
    AddColumnJob, DataSourceStatus, JobStatus, PoolStatus, Presence, RemoteErrorDetail,
};
