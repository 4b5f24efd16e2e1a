// SQLite ReductionStore Implementation

use crate::error::{decode_json, map_sqlx_error};
use async_trait::async_trait;
use eqsans_core::domain::{
    Experiment, NewReduction, Reduction, ReductionId, ReductionParameters, UNCATEGORIZED,
};
use eqsans_core::error::{AppError, Result};
use eqsans_core::port::ReductionStore;
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteReductionStore {
    pool: SqlitePool,
}

impl SqliteReductionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReductionRow {
    id: i64,
    owner: String,
    instrument: String,
    name: String,
    data_file: String,
    experiment_id: i64,
    parameters: String,
    created_at: i64,
}

impl ReductionRow {
    fn into_reduction(self) -> Result<Reduction> {
        let parameters = ReductionParameters::from_value(decode_json("parameters", &self.parameters)?)?;
        Ok(Reduction {
            id: self.id,
            owner: self.owner,
            instrument: self.instrument,
            name: self.name,
            data_file: self.data_file,
            experiment_id: self.experiment_id,
            parameters,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExperimentRow {
    id: i64,
    name: String,
    created_at: i64,
}

impl From<ExperimentRow> for Experiment {
    fn from(row: ExperimentRow) -> Self {
        Experiment {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ReductionStore for SqliteReductionStore {
    async fn create(&self, reduction: &NewReduction, created_at: i64) -> Result<Reduction> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let experiment = reduction.experiment.as_deref().unwrap_or(UNCATEGORIZED);
        sqlx::query("INSERT OR IGNORE INTO experiments (name, created_at) VALUES (?, ?)")
            .bind(experiment)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let experiment_id: i64 = sqlx::query_scalar("SELECT id FROM experiments WHERE name = ?")
            .bind(experiment)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let parameters = reduction.parameters.as_value();
        let result = sqlx::query(
            r#"
            INSERT INTO reductions (owner, instrument, name, data_file, experiment_id, parameters, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reduction.owner)
        .bind(&reduction.instrument)
        .bind(&reduction.name)
        .bind(&reduction.data_file)
        .bind(experiment_id)
        .bind(parameters.to_string())
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Reduction {
            id: result.last_insert_rowid(),
            owner: reduction.owner.clone(),
            instrument: reduction.instrument.clone(),
            name: reduction.name.clone(),
            data_file: reduction.data_file.clone(),
            experiment_id,
            parameters: reduction.parameters.clone(),
            created_at,
        })
    }

    async fn find(&self, id: ReductionId) -> Result<Option<Reduction>> {
        let row = sqlx::query_as::<_, ReductionRow>("SELECT * FROM reductions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ReductionRow::into_reduction).transpose()
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Reduction>> {
        let rows = sqlx::query_as::<_, ReductionRow>(
            "SELECT * FROM reductions WHERE owner = ? ORDER BY id DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ReductionRow::into_reduction).collect()
    }

    async fn delete(&self, id: ReductionId) -> Result<bool> {
        // remote_jobs and plots go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM reductions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(reduction_id = id, deleted = result.rows_affected(), "Reduction delete");
        Ok(result.rows_affected() > 0)
    }

    async fn uncategorized(&self) -> Result<Experiment> {
        let row = sqlx::query_as::<_, ExperimentRow>("SELECT * FROM experiments WHERE name = ?")
            .bind(UNCATEGORIZED)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Experiment::from).ok_or_else(|| {
            AppError::Database("uncategorized experiment missing, migrations not applied".to_string())
        })
    }
}
