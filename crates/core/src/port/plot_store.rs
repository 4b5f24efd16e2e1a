// Plot Store Port (Interface)

use crate::domain::{PlotArtifact, PlotData};
use crate::error::Result;
use async_trait::async_trait;

/// Cache of parsed result files keyed by (job, filename, owner)
#[async_trait]
pub trait PlotStore: Send + Sync {
    async fn find(
        &self,
        remote_job_id: i64,
        filename: &str,
        owner: &str,
    ) -> Result<Option<PlotArtifact>>;

    /// Insert the artifact, or return the stored one when the key exists.
    ///
    /// A stored entry with empty data is overwritten by non-empty data;
    /// a non-empty entry is never replaced.
    async fn insert_or_get(
        &self,
        remote_job_id: i64,
        filename: &str,
        owner: &str,
        data: &PlotData,
        created_at: i64,
    ) -> Result<PlotArtifact>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory plot store with the same insert-or-get semantics as SQLite
    #[derive(Default)]
    pub struct InMemoryPlotStore {
        entries: Mutex<HashMap<(i64, String, String), PlotArtifact>>,
        inserts: Mutex<usize>,
    }

    impl InMemoryPlotStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `insert_or_get` calls that wrote a row
        pub fn write_count(&self) -> usize {
            *self.inserts.lock().unwrap()
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PlotStore for InMemoryPlotStore {
        async fn find(
            &self,
            remote_job_id: i64,
            filename: &str,
            owner: &str,
        ) -> Result<Option<PlotArtifact>> {
            let key = (remote_job_id, filename.to_string(), owner.to_string());
            Ok(self.entries.lock().unwrap().get(&key).cloned())
        }

        async fn insert_or_get(
            &self,
            remote_job_id: i64,
            filename: &str,
            owner: &str,
            data: &PlotData,
            created_at: i64,
        ) -> Result<PlotArtifact> {
            let key = (remote_job_id, filename.to_string(), owner.to_string());
            let mut entries = self.entries.lock().unwrap();
            let next_id = entries.len() as i64 + 1;

            match entries.get_mut(&key) {
                Some(existing) if existing.data.is_empty() && !data.is_empty() => {
                    existing.data = data.clone();
                    *self.inserts.lock().unwrap() += 1;
                    Ok(existing.clone())
                }
                Some(existing) => Ok(existing.clone()),
                None => {
                    let artifact = PlotArtifact {
                        id: next_id,
                        remote_job_id,
                        filename: filename.to_string(),
                        owner: owner.to_string(),
                        data: data.clone(),
                        created_at,
                    };
                    entries.insert(key, artifact.clone());
                    *self.inserts.lock().unwrap() += 1;
                    Ok(artifact)
                }
            }
        }
    }
}
