// Reduction Store Port (Interface)

use crate::domain::{Experiment, NewReduction, Reduction, ReductionId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ReductionStore: Send + Sync {
    /// Insert a reduction. The experiment is looked up by name (created if
    /// missing); no name files it under the seeded "uncategorized" experiment.
    async fn create(&self, reduction: &NewReduction, created_at: i64) -> Result<Reduction>;

    async fn find(&self, id: ReductionId) -> Result<Option<Reduction>>;

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Reduction>>;

    /// Delete a reduction together with its remote jobs and their plots.
    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: ReductionId) -> Result<bool>;

    /// The experiment seeded at migration time
    async fn uncategorized(&self) -> Result<Experiment>;
}
