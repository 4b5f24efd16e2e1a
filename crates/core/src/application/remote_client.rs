// Remote Job Client - transaction/job lifecycle against Fermi

use crate::domain::{
    AuthStatus, Credentials, JobInfo, RemoteJobId, RequestContext, SessionToken, Transaction,
};
use crate::error::{AppError, RemoteError, RemoteResult, Result};
use crate::port::{RemoteService, SubmitRequest, TimeProvider, TransactionStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to the local record on `stop_transaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStop {
    Deactivated,
    AlreadyInactive,
    NotOwner,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub local: LocalStop,
    /// Whether the remote stop call succeeded
    pub remote_stopped: bool,
}

fn session_token(ctx: &RequestContext) -> RemoteResult<&SessionToken> {
    ctx.session_token
        .as_ref()
        .ok_or_else(|| RemoteError::Auth("no Fermi session, authenticate first".to_string()))
}

/// Remote Job Client.
///
/// Every operation takes the caller's `RequestContext` explicitly; the cookie,
/// Fermi uid and active transaction id live there and nowhere else.
pub struct RemoteJobClient {
    remote: Arc<dyn RemoteService>,
    transactions: Arc<dyn TransactionStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RemoteJobClient {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        transactions: Arc<dyn TransactionStore>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            remote,
            transactions,
            time_provider,
        }
    }

    /// Exchange credentials for a session cookie, cached in `ctx`
    pub async fn authenticate(
        &self,
        ctx: &mut RequestContext,
        credentials: &Credentials,
    ) -> RemoteResult<SessionToken> {
        match self.remote.authenticate(credentials).await {
            Ok(auth) => {
                info!(session = %ctx.session_id, uid = %auth.uid, "Authenticated with Fermi");
                ctx.session_token = Some(auth.token.clone());
                ctx.fermi_uid = Some(auth.uid);
                Ok(auth.token)
            }
            Err(e) => {
                warn!(session = %ctx.session_id, username = %credentials.username, error = %e, "Fermi authentication failed");
                ctx.clear_authentication();
                Err(e)
            }
        }
    }

    pub async fn authentication_status(&self, ctx: &mut RequestContext) -> AuthStatus {
        let Some(token) = ctx.session_token.clone() else {
            return AuthStatus::Anonymous;
        };
        if let Some(uid) = &ctx.fermi_uid {
            return AuthStatus::Authenticated(uid.clone());
        }

        match self.remote.whoami(&token).await {
            Ok(uid) => {
                ctx.fermi_uid = Some(uid.clone());
                AuthStatus::Authenticated(uid)
            }
            Err(e) => {
                warn!(session = %ctx.session_id, error = %e, "Could not resolve Fermi user");
                if e.is_auth() {
                    ctx.clear_authentication();
                }
                AuthStatus::Anonymous
            }
        }
    }

    /// Return the session's transaction, or allocate a new remote directory.
    ///
    /// With `start_new == false` an active transaction referenced by `ctx`
    /// and owned by the caller is reused without a remote call.
    pub async fn start_transaction(
        &self,
        ctx: &mut RequestContext,
        start_new: bool,
    ) -> Result<Transaction> {
        if !start_new {
            if let Some(trans_id) = ctx.active_transaction_id.clone() {
                match self.transactions.find_by_trans_id(&trans_id).await? {
                    Some(tx) if tx.is_active && tx.is_owned_by(&ctx.user) => return Ok(tx),
                    _ => {
                        warn!(trans_id = %trans_id, user = %ctx.user, "Cached transaction unusable, starting a new one");
                        ctx.active_transaction_id = None;
                    }
                }
            }
        }

        let token = session_token(ctx)?;
        let remote = self.remote.start_transaction(token).await.map_err(|e| {
            error!(user = %ctx.user, error = %e, "Could not start Fermi transaction");
            e
        })?;

        let tx = self
            .transactions
            .create(
                &remote.trans_id,
                &remote.directory,
                &ctx.user,
                self.time_provider.now_millis(),
            )
            .await?;

        info!(trans_id = %tx.trans_id, user = %ctx.user, directory = %tx.directory, "Transaction started");
        ctx.active_transaction_id = Some(tx.trans_id.clone());
        Ok(tx)
    }

    /// Submit one script under `transaction`.
    ///
    /// The stored record is re-read first; a stopped transaction takes no
    /// further jobs.
    pub async fn submit_job(
        &self,
        ctx: &RequestContext,
        transaction: &Transaction,
        script: &str,
        script_name: &str,
    ) -> Result<RemoteJobId> {
        let current = self
            .transactions
            .find_by_id(transaction.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {}", transaction.trans_id)))?;
        current.ensure_active()?;

        let token = session_token(ctx)?;
        let request = SubmitRequest::new(&current.trans_id, script_name, script);

        match self.remote.submit(token, &request).await {
            Ok(job_id) => {
                info!(job_id = %job_id, trans_id = %current.trans_id, script_name, "Job submitted");
                Ok(job_id)
            }
            Err(e) => {
                error!(trans_id = %current.trans_id, script_name, error = %e, "Job submission failed");
                Err(e.into())
            }
        }
    }

    pub async fn query_job(&self, ctx: &RequestContext, job_id: &str) -> RemoteResult<JobInfo> {
        let token = session_token(ctx)?;
        self.remote.query_job(token, job_id).await.map_err(|e| {
            warn!(job_id, error = %e, "Job status query failed");
            e
        })
    }

    pub async fn list_remote_jobs(&self, ctx: &RequestContext) -> RemoteResult<Vec<JobInfo>> {
        let token = session_token(ctx)?;
        let mut jobs = self.remote.query_jobs(token).await.map_err(|e| {
            warn!(error = %e, "Job list query failed");
            e
        })?;
        jobs.sort_by(|a, b| job_order(&a.job_id, &b.job_id));
        Ok(jobs)
    }

    pub async fn query_files(&self, ctx: &RequestContext, trans_id: &str) -> RemoteResult<Vec<String>> {
        let token = session_token(ctx)?;
        self.remote.list_files(token, trans_id).await.map_err(|e| {
            warn!(trans_id, error = %e, "File list query failed");
            e
        })
    }

    pub async fn download_file(
        &self,
        ctx: &RequestContext,
        trans_id: &str,
        filename: &str,
    ) -> RemoteResult<Vec<u8>> {
        let token = session_token(ctx)?;
        self.remote
            .download(token, trans_id, filename)
            .await
            .map_err(|e| {
                warn!(trans_id, filename, error = %e, "Download failed");
                e
            })
    }

    /// Stop a transaction.
    ///
    /// The local record is deactivated only when owned by the caller; the
    /// remote stop is attempted regardless and its failure is only logged.
    pub async fn stop_transaction(
        &self,
        ctx: &mut RequestContext,
        trans_id: &str,
    ) -> Result<StopOutcome> {
        let local = match self.transactions.find_by_trans_id(trans_id).await? {
            None => {
                warn!(trans_id, user = %ctx.user, "Stopping unknown transaction");
                LocalStop::NotFound
            }
            Some(tx) if !tx.is_owned_by(&ctx.user) => {
                error!(trans_id, user = %ctx.user, owner = %tx.owner, "User not authorized to stop transaction");
                LocalStop::NotOwner
            }
            Some(tx) => {
                if self.transactions.deactivate(&tx).await? {
                    info!(trans_id, user = %ctx.user, "Transaction deactivated");
                    LocalStop::Deactivated
                } else {
                    LocalStop::AlreadyInactive
                }
            }
        };

        ctx.active_transaction_id = None;

        let remote_stopped = match session_token(ctx) {
            Ok(token) => match self.remote.stop_transaction(token, trans_id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(trans_id, error = %e, "Remote transaction stop failed");
                    false
                }
            },
            Err(e) => {
                warn!(trans_id, error = %e, "Skipping remote transaction stop");
                false
            }
        };

        Ok(StopOutcome {
            local,
            remote_stopped,
        })
    }

    pub async fn list_transactions(&self, ctx: &RequestContext) -> Result<Vec<Transaction>> {
        self.transactions.list_by_owner(&ctx.user).await
    }

    pub async fn find_transaction(&self, trans_id: &str) -> Result<Option<Transaction>> {
        self.transactions.find_by_trans_id(trans_id).await
    }

    pub async fn transaction_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        self.transactions.find_by_id(id).await
    }
}

/// Numeric job ids sort numerically, anything else lexically after them
fn job_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
