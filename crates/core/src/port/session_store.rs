// Session Store Port (Interface)

use crate::domain::RequestContext;
use crate::error::Result;
use async_trait::async_trait;

/// Persisted per-session state backing `RequestContext`
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<RequestContext>>;

    /// Upsert the whole context
    async fn save(&self, context: &RequestContext, updated_at: i64) -> Result<()>;
}
