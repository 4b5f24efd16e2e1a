// Catalog Service Port (ICAT)

use crate::domain::{ExperimentMetadata, RunInfo};
use crate::error::RemoteResult;
use async_trait::async_trait;

/// Read-only access to the experiment catalog
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Instrument names, excluding the `*A` aliases
    async fn instruments(&self) -> RemoteResult<Vec<String>>;

    /// IPTS names of one instrument
    async fn experiments(&self, instrument: &str) -> RemoteResult<Vec<String>>;

    async fn experiment_metadata(
        &self,
        instrument: &str,
        ipts: &str,
    ) -> RemoteResult<ExperimentMetadata>;

    async fn runs(&self, instrument: &str, ipts: &str) -> RemoteResult<Vec<RunInfo>>;
}
