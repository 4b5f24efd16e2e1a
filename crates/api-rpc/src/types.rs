//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results. Every method except
//! `session.open.v1` and the catalog methods names the portal session it
//! runs under.

use eqsans_core::application::CreateReduction;
use eqsans_core::domain::{AuthStatus, ExperimentMetadata, ReductionId, RunInfo};
use serde::{Deserialize, Serialize};

/// Methods that only need the session
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// session.open.v1 - Open (or resume) a portal session for a user
#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub user: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenSessionResponse {
    pub session_id: String,
    pub user: String,
    pub auth: AuthStatus,
}

/// remote.authenticate.v1
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub session_id: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateResponse {
    pub authenticated: bool,
    pub fermi_uid: Option<String>,
}

/// remote.transaction.start.v1
#[derive(Debug, Deserialize)]
pub struct StartTransactionRequest {
    pub session_id: String,
    /// Force a new transaction even when the session has an active one
    #[serde(default)]
    pub new: bool,
}

/// remote.transaction.stop.v1, remote.files.v1
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub session_id: String,
    pub trans_id: String,
}

/// remote.job.v1
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub session_id: String,
    pub job_id: String,
}

/// remote.download.v1
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub session_id: String,
    pub trans_id: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResponse {
    pub trans_id: String,
    pub file: String,
    pub size: usize,
    /// Standard base64
    pub content: String,
}

/// reduction.create.v1
#[derive(Debug, Deserialize)]
pub struct CreateReductionRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub reduction: CreateReduction,
}

/// reduction.delete.v1, reduction.script.v1, reduction.submit.v1
#[derive(Debug, Deserialize)]
pub struct ReductionRequest {
    pub session_id: String,
    pub reduction_id: ReductionId,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReductionResponse {
    pub reduction_id: ReductionId,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptResponse {
    pub reduction_id: ReductionId,
    pub script: String,
}

/// reduction.submit_set.v1
#[derive(Debug, Deserialize)]
pub struct SubmitSetRequest {
    pub session_id: String,
    pub reduction_ids: Vec<ReductionId>,
}

/// reduction.jobs.v1 - jobs of one reduction, or every active job
#[derive(Debug, Deserialize)]
pub struct ReductionJobsRequest {
    pub session_id: String,
    #[serde(default)]
    pub reduction_id: Option<ReductionId>,
}

/// catalog.instruments.v1 entry
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentEntry {
    pub name: String,
    /// Set for instruments this portal can reduce
    pub reduction_url: Option<String>,
    pub remote_jobs_url: Option<String>,
}

/// catalog.experiments.v1
#[derive(Debug, Deserialize)]
pub struct ExperimentsRequest {
    pub instrument: String,
}

/// catalog.experiment.v1
#[derive(Debug, Deserialize)]
pub struct ExperimentRequest {
    pub instrument: String,
    pub ipts: String,
    #[serde(default = "default_true")]
    pub include_runs: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogRun {
    #[serde(flatten)]
    pub run: RunInfo,
    pub reduce_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResponse {
    pub instrument: String,
    pub ipts: String,
    pub metadata: ExperimentMetadata,
    pub runs: Vec<CatalogRun>,
}
