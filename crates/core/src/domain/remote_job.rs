// Remote Job Domain Model

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};

/// Remote job identifier as issued by Fermi (`JobID`)
pub type RemoteJobId = String;

/// One script execution submitted under a transaction.
///
/// Immutable once created; plot artifacts hang off it in the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteJob {
    pub id: i64,
    pub remote_id: RemoteJobId,
    pub reduction_id: i64,
    /// Local id of the owning transaction row
    pub transaction_id: i64,
    /// Reduction parameters at submit time (JSON)
    pub parameters: serde_json::Value,
    pub created_at: i64, // epoch ms
}

/// Remote job about to be recorded after a successful submit
#[derive(Debug, Clone)]
pub struct NewRemoteJob {
    pub remote_id: RemoteJobId,
    pub reduction_id: i64,
    pub transaction_id: i64,
    pub parameters: serde_json::Value,
}

/// Scheduler state reported by Fermi's `JobStatus` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Removed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUEUED" | "IDLE" | "DEFERRED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "REMOVED" => JobStatus::Removed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Other(value.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Removed | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Removed => write!(f, "REMOVED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Status record of one remote job, as answered by `query`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo {
    pub job_id: RemoteJobId,
    pub status: JobStatus,
    pub job_name: String,
    pub script_name: String,
    pub trans_id: String,
    pub submit_date: Option<DateTime<FixedOffset>>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub completion_date: Option<DateTime<FixedOffset>>,
}
