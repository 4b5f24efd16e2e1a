// SQLite SessionStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use eqsans_core::domain::{RequestContext, SessionToken};
use eqsans_core::error::Result;
use eqsans_core::port::SessionStore;
use sqlx::SqlitePool;

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    user: String,
    session_token: Option<String>,
    fermi_uid: Option<String>,
    active_transaction_id: Option<String>,
}

impl From<SessionRow> for RequestContext {
    fn from(row: SessionRow) -> Self {
        RequestContext {
            session_id: row.session_id,
            user: row.user,
            session_token: row.session_token.map(SessionToken::new),
            fermi_uid: row.fermi_uid,
            active_transaction_id: row.active_transaction_id,
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<RequestContext>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user, session_token, fermi_uid, active_transaction_id
            FROM sessions WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RequestContext::from))
    }

    async fn save(&self, context: &RequestContext, updated_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user, session_token, fermi_uid, active_transaction_id, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (session_id) DO UPDATE
            SET user = excluded.user,
                session_token = excluded.session_token,
                fermi_uid = excluded.fermi_uid,
                active_transaction_id = excluded.active_transaction_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&context.session_id)
        .bind(&context.user)
        .bind(context.session_token.as_ref().map(|t| t.as_str()))
        .bind(&context.fermi_uid)
        .bind(&context.active_transaction_id)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
