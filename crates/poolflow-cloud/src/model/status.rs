//! Remote status enumerations and asynchronous jobs

use crate::poller::Observation;
use serde::{Deserialize, Serialize};

/// Data pool lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolStatus {
    Created,
    Pending,
    Live,
    Deleting,
    Broken,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStatus::Created => write!(f, "CREATED"),
            PoolStatus::Pending => write!(f, "PENDING"),
            PoolStatus::Live => write!(f, "LIVE"),
            PoolStatus::Deleting => write!(f, "DELETING"),
            PoolStatus::Broken => write!(f, "BROKEN"),
        }
    }
}

/// Data source lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceStatus {
    Created,
    Pending,
    Connecting,
    Connected,
    Broken,
    Deleting,
}

impl std::fmt::Display for DataSourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceStatus::Created => write!(f, "CREATED"),
            DataSourceStatus::Pending => write!(f, "PENDING"),
            DataSourceStatus::Connecting => write!(f, "CONNECTING"),
            DataSourceStatus::Connected => write!(f, "CONNECTED"),
            DataSourceStatus::Broken => write!(f, "BROKEN"),
            DataSourceStatus::Deleting => write!(f, "DELETING"),
        }
    }
}

/// Status for entities the platform creates synchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    Present,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PRESENT")
    }
}

/// Asynchronous job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Error detail attached to a failed job or a broken entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorDetail {
    pub message: String,
}

/// Job adding one column to an existing data pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnJob {
    pub id: String,

    pub status: JobStatus,

    #[serde(default)]
    pub error: Option<RemoteErrorDetail>,
}

impl AddColumnJob {
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

impl Observation for AddColumnJob {
    type Status = JobStatus;

    fn status(&self) -> JobStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        self.error_message().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_terminal_statuses() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Created.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_job_deserialize() {
        let job: AddColumnJob = serde_json::from_value(serde_json::json!({
            "id": "JOB01",
            "status": "FAILED",
            "error": { "message": "column already exists in table" }
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message(), Some("column already exists in table"));
        assert_eq!(job.status.to_string(), "FAILED");
    }
}
