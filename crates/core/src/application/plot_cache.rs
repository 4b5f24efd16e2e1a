// Job/Plot Cache - lazy fill of parsed result files

use crate::domain::{PlotArtifact, PlotData, RemoteJob};
use crate::error::{RemoteResult, Result};
use crate::port::{PlotStore, TimeProvider};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

pub struct PlotCache {
    store: Arc<dyn PlotStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PlotCache {
    pub fn new(store: Arc<dyn PlotStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            time_provider,
        }
    }

    /// Return the cached artifact for (job, filename, owner), downloading and
    /// parsing the file on a miss.
    ///
    /// An entry whose parsed data is empty counts as a miss and is refilled.
    pub async fn get_or_fetch<F, Fut, P>(
        &self,
        job: &RemoteJob,
        filename: &str,
        owner: &str,
        fetch: F,
        parse: P,
    ) -> Result<PlotArtifact>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = RemoteResult<Vec<u8>>> + Send,
        P: FnOnce(&[u8]) -> PlotData + Send,
    {
        if let Some(hit) = self.store.find(job.id, filename, owner).await? {
            if !hit.data.is_empty() {
                debug!(job_id = %job.remote_id, filename, "Plot cache hit");
                return Ok(hit);
            }
        }

        debug!(job_id = %job.remote_id, filename, "Plot cache miss, downloading");
        let content = fetch().await?;
        let data = parse(&content);

        self.store
            .insert_or_get(
                job.id,
                filename,
                owner,
                &data,
                self.time_provider.now_millis(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::parser::parse_iq;
    use crate::domain::IqPoint;
    use crate::error::{AppError, RemoteError};
    use crate::port::plot_store::mocks::InMemoryPlotStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job() -> RemoteJob {
        RemoteJob {
            id: 7,
            remote_id: "1001".to_string(),
            reduction_id: 1,
            transaction_id: 1,
            parameters: serde_json::json!({}),
            created_at: 0,
        }
    }

    fn cache(store: Arc<InMemoryPlotStore>) -> PlotCache {
        PlotCache::new(store, Arc::new(FixedTimeProvider::new(5_000)))
    }

    #[tokio::test]
    async fn test_second_lookup_does_not_download() {
        let store = Arc::new(InMemoryPlotStore::new());
        let cache = cache(store.clone());
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(b"0.1 100.0 5.0\n".to_vec())
        };

        let first = cache
            .get_or_fetch(&job(), "4065_Iq.txt", "alice", fetch, |b| {
                PlotData::OneD(parse_iq(b))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(&job(), "4065_Iq.txt", "alice", fetch, |b| {
                PlotData::OneD(parse_iq(b))
            })
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(
            first.data,
            PlotData::OneD(vec![IqPoint::new(0.1, 100.0, 5.0)])
        );
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_owner_is_part_of_key() {
        let store = Arc::new(InMemoryPlotStore::new());
        let cache = cache(store.clone());
        let fetch = || async { Ok(b"0.1 1.0 1.0\n".to_vec()) };

        for owner in ["alice", "bob"] {
            cache
                .get_or_fetch(&job(), "4065_Iq.txt", owner, fetch, |b| {
                    PlotData::OneD(parse_iq(b))
                })
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_entry_is_refilled() {
        let store = Arc::new(InMemoryPlotStore::new());
        let cache = cache(store.clone());

        let empty = cache
            .get_or_fetch(
                &job(),
                "4065_Iq.txt",
                "alice",
                || async { Ok(b"not ready\n".to_vec()) },
                |b| PlotData::OneD(parse_iq(b)),
            )
            .await
            .unwrap();
        assert!(empty.data.is_empty());

        let filled = cache
            .get_or_fetch(
                &job(),
                "4065_Iq.txt",
                "alice",
                || async { Ok(b"0.1 2.0 0.5\n".to_vec()) },
                |b| PlotData::OneD(parse_iq(b)),
            )
            .await
            .unwrap();
        assert!(!filled.data.is_empty());
        assert_eq!(filled.id, empty.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_caches_nothing() {
        let store = Arc::new(InMemoryPlotStore::new());
        let cache = cache(store.clone());

        let result = cache
            .get_or_fetch(
                &job(),
                "4065_Iq.txt",
                "alice",
                || async { Err(RemoteError::Connectivity("timeout".to_string())) },
                |b| PlotData::OneD(parse_iq(b)),
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Remote(RemoteError::Connectivity(_)))
        ));
        assert_eq!(store.len(), 0);
    }
}
