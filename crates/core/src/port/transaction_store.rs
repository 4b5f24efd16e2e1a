// Transaction Store Port (Interface)

use crate::domain::Transaction;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of remote transactions.
///
/// Rows are never deleted; `deactivate` is the only mutation.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Most recent active transaction of `owner`
    async fn get_active(&self, owner: &str) -> Result<Option<Transaction>>;

    async fn find_by_trans_id(&self, trans_id: &str) -> Result<Option<Transaction>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>>;

    /// Insert a new active row.
    ///
    /// # Errors
    /// - AppError::Conflict if `trans_id` is already recorded
    async fn create(
        &self,
        trans_id: &str,
        directory: &str,
        owner: &str,
        created_at: i64,
    ) -> Result<Transaction>;

    /// Flip the row to inactive. Returns `true` only on the active -> inactive edge.
    async fn deactivate(&self, transaction: &Transaction) -> Result<bool>;

    /// All transactions of `owner`, newest first
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Transaction>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryTransactionStore {
        rows: Mutex<Vec<Transaction>>,
    }

    impl InMemoryTransactionStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl TransactionStore for InMemoryTransactionStore {
        async fn get_active(&self, owner: &str) -> Result<Option<Transaction>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .find(|t| t.is_active && t.is_owned_by(owner))
                .cloned())
        }

        async fn find_by_trans_id(&self, trans_id: &str) -> Result<Option<Transaction>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|t| t.trans_id == trans_id).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|t| t.id == id).cloned())
        }

        async fn create(
            &self,
            trans_id: &str,
            directory: &str,
            owner: &str,
            created_at: i64,
        ) -> Result<Transaction> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|t| t.trans_id == trans_id) {
                return Err(AppError::Conflict(format!(
                    "transaction {} already recorded",
                    trans_id
                )));
            }
            let tx = Transaction {
                id: rows.len() as i64 + 1,
                trans_id: trans_id.to_string(),
                owner: owner.to_string(),
                directory: directory.to_string(),
                is_active: true,
                created_at,
            };
            rows.push(tx.clone());
            Ok(tx)
        }

        async fn deactivate(&self, transaction: &Transaction) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|t| t.id == transaction.id) {
                Some(row) => Ok(row.deactivate()),
                None => Ok(false),
            }
        }

        async fn list_by_owner(&self, owner: &str) -> Result<Vec<Transaction>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|t| t.is_owned_by(owner))
                .cloned()
                .collect())
        }
    }
}
