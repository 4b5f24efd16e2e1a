// SQLite RemoteJobStore Implementation

use crate::error::{decode_json, map_sqlx_error};
use async_trait::async_trait;
use eqsans_core::domain::{NewRemoteJob, RemoteJob};
use eqsans_core::error::Result;
use eqsans_core::port::RemoteJobStore;
use sqlx::SqlitePool;

pub struct SqliteRemoteJobStore {
    pool: SqlitePool,
}

impl SqliteRemoteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RemoteJobRow {
    id: i64,
    remote_id: String,
    reduction_id: i64,
    transaction_id: i64,
    parameters: String,
    created_at: i64,
}

impl RemoteJobRow {
    fn into_job(self) -> Result<RemoteJob> {
        Ok(RemoteJob {
            id: self.id,
            remote_id: self.remote_id,
            reduction_id: self.reduction_id,
            transaction_id: self.transaction_id,
            parameters: decode_json("parameters", &self.parameters)?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl RemoteJobStore for SqliteRemoteJobStore {
    async fn insert(&self, job: &NewRemoteJob, created_at: i64) -> Result<RemoteJob> {
        let result = sqlx::query(
            r#"
            INSERT INTO remote_jobs (remote_id, reduction_id, transaction_id, parameters, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.remote_id)
        .bind(job.reduction_id)
        .bind(job.transaction_id)
        .bind(job.parameters.to_string())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(RemoteJob {
            id: result.last_insert_rowid(),
            remote_id: job.remote_id.clone(),
            reduction_id: job.reduction_id,
            transaction_id: job.transaction_id,
            parameters: job.parameters.clone(),
            created_at,
        })
    }

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<RemoteJob>> {
        let row = sqlx::query_as::<_, RemoteJobRow>("SELECT * FROM remote_jobs WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(RemoteJobRow::into_job).transpose()
    }

    async fn list_active_for_owner(&self, owner: &str) -> Result<Vec<RemoteJob>> {
        let rows = sqlx::query_as::<_, RemoteJobRow>(
            r#"
            SELECT rj.* FROM remote_jobs rj
            JOIN transactions t ON t.id = rj.transaction_id
            WHERE t.owner = ? AND t.is_active = 1
            ORDER BY rj.id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(RemoteJobRow::into_job).collect()
    }

    async fn list_for_reduction(&self, reduction_id: i64) -> Result<Vec<RemoteJob>> {
        let rows = sqlx::query_as::<_, RemoteJobRow>(
            "SELECT * FROM remote_jobs WHERE reduction_id = ? ORDER BY id DESC",
        )
        .bind(reduction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(RemoteJobRow::into_job).collect()
    }
}
