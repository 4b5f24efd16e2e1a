// Transaction Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Remote transaction identifier as issued by Fermi (`TransID`)
pub type TransactionId = String;

/// Answer of the remote service to a "start transaction" call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTransaction {
    pub trans_id: TransactionId,
    pub directory: String,
}

/// One allocated remote working directory.
///
/// Created after the remote service granted a transaction, deactivated when
/// stopped, never deleted. Once inactive the record is history and must not
/// be touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub trans_id: TransactionId,
    pub owner: String,
    pub directory: String,
    pub is_active: bool,
    pub created_at: i64, // epoch ms
}

impl Transaction {
    pub fn is_owned_by(&self, user: &str) -> bool {
        self.owner == user
    }

    /// Flip to inactive. Returns `false` when already inactive (no reactivation path exists).
    pub fn deactivate(&mut self) -> bool {
        let was_active = self.is_active;
        self.is_active = false;
        was_active
    }

    /// Guard for operations that need a live remote directory
    pub fn ensure_active(&self) -> Result<()> {
        if !self.is_active {
            return Err(DomainError::InvalidStateTransition {
                from: format!("transaction {} (inactive)", self.trans_id),
                to: "submit".to_string(),
            });
        }
        Ok(())
    }
}
