// Remote Job Store Port (Interface)

use crate::domain::{NewRemoteJob, RemoteJob};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RemoteJobStore: Send + Sync {
    /// Record a submitted job.
    ///
    /// # Errors
    /// - AppError::Conflict if the remote id is already recorded
    async fn insert(&self, job: &NewRemoteJob, created_at: i64) -> Result<RemoteJob>;

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<RemoteJob>>;

    /// Jobs of `owner` whose transaction is still active, newest first
    async fn list_active_for_owner(&self, owner: &str) -> Result<Vec<RemoteJob>>;

    async fn list_for_reduction(&self, reduction_id: i64) -> Result<Vec<RemoteJob>>;
}
