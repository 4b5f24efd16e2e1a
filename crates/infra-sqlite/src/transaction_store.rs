// SQLite TransactionStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use eqsans_core::domain::Transaction;
use eqsans_core::error::Result;
use eqsans_core::port::TransactionStore;
use sqlx::SqlitePool;

pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    trans_id: String,
    owner: String,
    directory: String,
    is_active: bool,
    created_at: i64,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            trans_id: row.trans_id,
            owner: row.owner,
            directory: row.directory,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn get_active(&self, owner: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE owner = ? AND is_active = 1 ORDER BY id DESC LIMIT 1",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Transaction::from))
    }

    async fn find_by_trans_id(&self, trans_id: &str) -> Result<Option<Transaction>> {
        let row =
            sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE trans_id = ?")
                .bind(trans_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(Transaction::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Transaction::from))
    }

    async fn create(
        &self,
        trans_id: &str,
        directory: &str,
        owner: &str,
        created_at: i64,
    ) -> Result<Transaction> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (trans_id, owner, directory, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(trans_id)
        .bind(owner)
        .bind(directory)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Transaction {
            id: result.last_insert_rowid(),
            trans_id: trans_id.to_string(),
            owner: owner.to_string(),
            directory: directory.to_string(),
            is_active: true,
            created_at,
        })
    }

    async fn deactivate(&self, transaction: &Transaction) -> Result<bool> {
        // Only the active -> inactive edge touches a row
        let result = sqlx::query("UPDATE transactions SET is_active = 0 WHERE id = ? AND is_active = 1")
            .bind(transaction.id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE owner = ? ORDER BY id DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}
