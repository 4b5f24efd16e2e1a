// SQLite PlotStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use eqsans_core::domain::{PlotArtifact, PlotData};
use eqsans_core::error::{AppError, Result};
use eqsans_core::port::PlotStore;
use sqlx::SqlitePool;

pub struct SqlitePlotStore {
    pool: SqlitePool,
}

impl SqlitePlotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlotRow {
    id: i64,
    remote_job_id: i64,
    filename: String,
    owner: String,
    payload: String,
    created_at: i64,
}

impl PlotRow {
    fn into_artifact(self) -> Result<PlotArtifact> {
        let data: PlotData = serde_json::from_str(&self.payload).map_err(|e| {
            AppError::Database(format!("corrupt plot payload {}: {}", self.id, e))
        })?;
        Ok(PlotArtifact {
            id: self.id,
            remote_job_id: self.remote_job_id,
            filename: self.filename,
            owner: self.owner,
            data,
            created_at: self.created_at,
        })
    }
}

const SELECT_PLOT: &str =
    "SELECT * FROM plots WHERE remote_job_id = ? AND filename = ? AND owner = ?";

#[async_trait]
impl PlotStore for SqlitePlotStore {
    async fn find(
        &self,
        remote_job_id: i64,
        filename: &str,
        owner: &str,
    ) -> Result<Option<PlotArtifact>> {
        let row = sqlx::query_as::<_, PlotRow>(SELECT_PLOT)
            .bind(remote_job_id)
            .bind(filename)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(PlotRow::into_artifact).transpose()
    }

    async fn insert_or_get(
        &self,
        remote_job_id: i64,
        filename: &str,
        owner: &str,
        data: &PlotData,
        created_at: i64,
    ) -> Result<PlotArtifact> {
        let payload = serde_json::to_string(data)?;

        // The UNIQUE key makes concurrent fills idempotent; only an empty
        // entry is ever overwritten.
        sqlx::query(
            r#"
            INSERT INTO plots (remote_job_id, filename, owner, kind, is_empty, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (remote_job_id, filename, owner) DO UPDATE
            SET kind = excluded.kind, is_empty = excluded.is_empty, payload = excluded.payload
            WHERE plots.is_empty = 1 AND excluded.is_empty = 0
            "#,
        )
        .bind(remote_job_id)
        .bind(filename)
        .bind(owner)
        .bind(data.kind().as_str())
        .bind(data.is_empty())
        .bind(&payload)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PlotRow>(SELECT_PLOT)
            .bind(remote_job_id)
            .bind(filename)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.into_artifact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create_pool, run_migrations, SqliteReductionStore, SqliteRemoteJobStore,
        SqliteTransactionStore,
    };
    use eqsans_core::domain::{
        Grid2d, IqPoint, NewRemoteJob, NewReduction, ReductionParameters,
    };
    use eqsans_core::port::{ReductionStore, RemoteJobStore, TransactionStore};

    struct Db {
        plots: SqlitePlotStore,
        reductions: SqliteReductionStore,
        job_id: i64,
        reduction_id: i64,
    }

    async fn setup_db() -> Db {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let reductions = SqliteReductionStore::new(pool.clone());
        let reduction = reductions
            .create(
                &NewReduction {
                    owner: "alice".to_string(),
                    instrument: "eqsans".to_string(),
                    name: "r".to_string(),
                    data_file: "4065".to_string(),
                    experiment: None,
                    parameters: ReductionParameters::default(),
                },
                1,
            )
            .await
            .unwrap();
        let tx = SqliteTransactionStore::new(pool.clone())
            .create("136", "/a", "alice", 1)
            .await
            .unwrap();
        let job = SqliteRemoteJobStore::new(pool.clone())
            .insert(
                &NewRemoteJob {
                    remote_id: "1001".to_string(),
                    reduction_id: reduction.id,
                    transaction_id: tx.id,
                    parameters: serde_json::json!({}),
                },
                2,
            )
            .await
            .unwrap();

        Db {
            plots: SqlitePlotStore::new(pool),
            reductions,
            job_id: job.id,
            reduction_id: reduction.id,
        }
    }

    fn one_d() -> PlotData {
        PlotData::OneD(vec![
            IqPoint::new(0.1, 100.0, 5.0),
            IqPoint::new(0.2, 90.0, 4.0),
        ])
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let db = setup_db().await;
        let stored = db
            .plots
            .insert_or_get(db.job_id, "4065_Iq.txt", "alice", &one_d(), 5)
            .await
            .unwrap();

        let found = db
            .plots
            .find(db.job_id, "4065_Iq.txt", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.data, one_d());
        assert!(db.plots.find(db.job_id, "4065_Iq.txt", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_insert_keeps_first_value() {
        let db = setup_db().await;
        let first = db
            .plots
            .insert_or_get(db.job_id, "4065_Iq.txt", "alice", &one_d(), 5)
            .await
            .unwrap();
        let other = PlotData::OneD(vec![IqPoint::new(9.0, 9.0, 9.0)]);
        let second = db
            .plots
            .insert_or_get(db.job_id, "4065_Iq.txt", "alice", &other, 6)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_entry_is_replaced() {
        let db = setup_db().await;
        let empty = db
            .plots
            .insert_or_get(db.job_id, "4065_Iq.txt", "alice", &PlotData::OneD(vec![]), 5)
            .await
            .unwrap();
        let filled = db
            .plots
            .insert_or_get(db.job_id, "4065_Iq.txt", "alice", &one_d(), 6)
            .await
            .unwrap();

        assert_eq!(empty.id, filled.id);
        assert_eq!(filled.data, one_d());
    }

    #[tokio::test]
    async fn test_grid_round_trip_and_cascade() {
        let db = setup_db().await;
        let grid = PlotData::TwoD(Grid2d::new(
            vec![vec![1.0, 2.0], vec![3.0, 0.0]],
            vec![-0.1, 0.1],
            vec![-0.2, 0.2],
        ));
        let stored = db
            .plots
            .insert_or_get(db.job_id, "4065_Iqxy.dat", "alice", &grid, 5)
            .await
            .unwrap();
        assert_eq!(stored.data, grid);

        db.reductions.delete(db.reduction_id).await.unwrap();
        assert!(db
            .plots
            .find(db.job_id, "4065_Iqxy.dat", "alice")
            .await
            .unwrap()
            .is_none());
    }
}
