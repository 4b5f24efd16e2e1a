//! Shared wiring: in-memory SQLite stores behind the real services, with a
//! scripted Fermi stand-in.

#![allow(dead_code)]

use std::sync::Arc;

use eqsans_core::application::{
    CreateReduction, InstrumentRegistry, PlotCache, ReductionService, RemoteJobClient,
};
use eqsans_core::domain::{Credentials, Reduction, RequestContext};
use eqsans_core::port::remote_service::mocks::MockRemoteService;
use eqsans_core::port::time_provider::mocks::FixedTimeProvider;
use eqsans_core::port::TimeProvider;
use eqsans_infra_sqlite::{
    create_pool, run_migrations, SqlitePlotStore, SqliteReductionStore, SqliteRemoteJobStore,
    SqliteSessionStore, SqliteTransactionStore,
};
use sqlx::SqlitePool;

pub struct Portal {
    pub pool: SqlitePool,
    pub remote: Arc<MockRemoteService>,
    pub time: Arc<FixedTimeProvider>,
    pub registry: Arc<InstrumentRegistry>,
    pub client: Arc<RemoteJobClient>,
    pub reductions: Arc<ReductionService>,
    pub sessions: Arc<SqliteSessionStore>,
}

impl Portal {
    pub async fn new() -> Self {
        Self::with_remote(Arc::new(MockRemoteService::new())).await
    }

    pub async fn with_remote(remote: Arc<MockRemoteService>) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time = Arc::new(FixedTimeProvider::new(1_700_000_000_000));
        let time_provider: Arc<dyn TimeProvider> = time.clone();
        let registry = Arc::new(InstrumentRegistry::with_defaults());

        let client = Arc::new(RemoteJobClient::new(
            remote.clone(),
            Arc::new(SqliteTransactionStore::new(pool.clone())),
            time_provider.clone(),
        ));
        let plots = Arc::new(PlotCache::new(
            Arc::new(SqlitePlotStore::new(pool.clone())),
            time_provider.clone(),
        ));
        let reductions = Arc::new(ReductionService::new(
            Arc::new(SqliteReductionStore::new(pool.clone())),
            Arc::new(SqliteRemoteJobStore::new(pool.clone())),
            client.clone(),
            plots,
            registry.clone(),
            time_provider,
        ));

        Self {
            sessions: Arc::new(SqliteSessionStore::new(pool.clone())),
            pool,
            remote,
            time,
            registry,
            client,
            reductions,
        }
    }

    /// Context of an authenticated portal user
    pub async fn login(&self, user: &str) -> RequestContext {
        let mut ctx = RequestContext::new(format!("session-{}", user), user);
        self.client
            .authenticate(&mut ctx, &Credentials::new(user, "secret"))
            .await
            .unwrap();
        ctx
    }

    pub async fn reduction(&self, ctx: &RequestContext, name: &str, run: &str) -> Reduction {
        self.reductions
            .create_reduction(
                ctx,
                CreateReduction {
                    instrument: "EQSANS".to_string(),
                    name: name.to_string(),
                    data_file: run.to_string(),
                    experiment: Some("IPTS-7342".to_string()),
                    parameters: serde_json::json!({
                        "beam_center_x": 92.0,
                        "beam_center_y": 125.0,
                        "sample_thickness": 0.1,
                    }),
                },
            )
            .await
            .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
