//! RPC Method Handlers
//!
//! Each session-bound method loads the `RequestContext` from the session
//! store, runs the application call against it, and writes it back.

use crate::error::{remote_to_rpc_error, to_rpc_error};
use crate::types::{
    AuthenticateRequest, AuthenticateResponse, CatalogRun, CreateReductionRequest,
    DeleteReductionResponse, DownloadRequest, DownloadResponse, ExperimentRequest,
    ExperimentResponse, ExperimentsRequest, InstrumentEntry, JobRequest, OpenSessionRequest,
    OpenSessionResponse, ReductionJobsRequest, ReductionRequest, ScriptResponse, SessionRequest,
    StartTransactionRequest, SubmitSetRequest, TransactionRequest,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use eqsans_core::application::{
    InstrumentRegistry, JobDetails, JobSetOutcome, ReductionService, RemoteJobClient, StopOutcome,
};
use eqsans_core::domain::{
    AuthStatus, Credentials, JobInfo, Reduction, RemoteJob, RequestContext, Transaction,
};
use eqsans_core::error::AppError;
use eqsans_core::port::{CatalogService, IdProvider, SessionStore, TimeProvider};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::{debug, info};

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    sessions: Arc<dyn SessionStore>,
    client: Arc<RemoteJobClient>,
    reductions: Arc<ReductionService>,
    catalog: Arc<dyn CatalogService>,
    registry: Arc<InstrumentRegistry>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RpcHandler {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        client: Arc<RemoteJobClient>,
        reductions: Arc<ReductionService>,
        catalog: Arc<dyn CatalogService>,
        registry: Arc<InstrumentRegistry>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            sessions,
            client,
            reductions,
            catalog,
            registry,
            id_provider,
            time_provider,
        }
    }

    async fn session(&self, session_id: &str) -> RpcResult<RequestContext> {
        self.sessions
            .load(session_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("session {}", session_id))))
    }

    async fn commit(&self, ctx: &RequestContext) -> RpcResult<()> {
        self.sessions
            .save(ctx, self.time_provider.now_millis())
            .await
            .map_err(to_rpc_error)
    }

    /// session.open.v1
    pub async fn open_session(&self, params: OpenSessionRequest) -> RpcResult<OpenSessionResponse> {
        let user = params.user.trim();
        if user.is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "user must not be empty".to_string(),
            )));
        }

        let ctx = match params.session_id {
            Some(session_id) => {
                let ctx = self.session(&session_id).await?;
                if ctx.user != user {
                    return Err(to_rpc_error(AppError::Forbidden(format!(
                        "session {} belongs to another user",
                        session_id
                    ))));
                }
                ctx
            }
            None => {
                let ctx = RequestContext::new(self.id_provider.generate_id(), user);
                self.commit(&ctx).await?;
                info!(session = %ctx.session_id, user = %ctx.user, "Session opened");
                ctx
            }
        };

        let auth = match &ctx.fermi_uid {
            Some(uid) if ctx.session_token.is_some() => AuthStatus::Authenticated(uid.clone()),
            _ => AuthStatus::Anonymous,
        };
        Ok(OpenSessionResponse {
            session_id: ctx.session_id,
            user: ctx.user,
            auth,
        })
    }

    /// remote.authenticate.v1
    pub async fn authenticate(
        &self,
        params: AuthenticateRequest,
    ) -> RpcResult<AuthenticateResponse> {
        let mut ctx = self.session(&params.session_id).await?;
        let credentials = Credentials::new(params.username, params.password);

        let result = self.client.authenticate(&mut ctx, &credentials).await;
        self.commit(&ctx).await?;
        result.map_err(remote_to_rpc_error)?;

        Ok(AuthenticateResponse {
            authenticated: true,
            fermi_uid: ctx.fermi_uid,
        })
    }

    /// remote.status.v1
    pub async fn status(&self, params: SessionRequest) -> RpcResult<AuthStatus> {
        let mut ctx = self.session(&params.session_id).await?;
        let status = self.client.authentication_status(&mut ctx).await;
        self.commit(&ctx).await?;
        Ok(status)
    }

    /// remote.transaction.start.v1
    pub async fn start_transaction(
        &self,
        params: StartTransactionRequest,
    ) -> RpcResult<Transaction> {
        let mut ctx = self.session(&params.session_id).await?;
        let result = self.client.start_transaction(&mut ctx, params.new).await;
        self.commit(&ctx).await?;
        result.map_err(to_rpc_error)
    }

    /// remote.transaction.stop.v1
    pub async fn stop_transaction(&self, params: TransactionRequest) -> RpcResult<StopOutcome> {
        let mut ctx = self.session(&params.session_id).await?;
        let result = self.client.stop_transaction(&mut ctx, &params.trans_id).await;
        self.commit(&ctx).await?;
        result.map_err(to_rpc_error)
    }

    /// remote.transactions.v1
    pub async fn transactions(&self, params: SessionRequest) -> RpcResult<Vec<Transaction>> {
        let ctx = self.session(&params.session_id).await?;
        self.client
            .list_transactions(&ctx)
            .await
            .map_err(to_rpc_error)
    }

    /// remote.jobs.v1
    pub async fn remote_jobs(&self, params: SessionRequest) -> RpcResult<Vec<JobInfo>> {
        let ctx = self.session(&params.session_id).await?;
        self.client
            .list_remote_jobs(&ctx)
            .await
            .map_err(remote_to_rpc_error)
    }

    /// remote.job.v1
    pub async fn job(&self, params: JobRequest) -> RpcResult<JobDetails> {
        let ctx = self.session(&params.session_id).await?;
        self.reductions
            .job_details(&ctx, &params.job_id)
            .await
            .map_err(to_rpc_error)
    }

    /// remote.files.v1
    pub async fn files(&self, params: TransactionRequest) -> RpcResult<Vec<String>> {
        let ctx = self.session(&params.session_id).await?;
        self.client
            .query_files(&ctx, &params.trans_id)
            .await
            .map_err(remote_to_rpc_error)
    }

    /// remote.download.v1
    pub async fn download(&self, params: DownloadRequest) -> RpcResult<DownloadResponse> {
        let ctx = self.session(&params.session_id).await?;
        let content = self
            .client
            .download_file(&ctx, &params.trans_id, &params.file)
            .await
            .map_err(remote_to_rpc_error)?;

        debug!(trans_id = %params.trans_id, file = %params.file, size = content.len(), "Serving download");
        Ok(DownloadResponse {
            size: content.len(),
            content: STANDARD.encode(&content),
            trans_id: params.trans_id,
            file: params.file,
        })
    }

    /// reduction.create.v1
    pub async fn create_reduction(&self, params: CreateReductionRequest) -> RpcResult<Reduction> {
        let ctx = self.session(&params.session_id).await?;
        self.reductions
            .create_reduction(&ctx, params.reduction)
            .await
            .map_err(to_rpc_error)
    }

    /// reduction.list.v1
    pub async fn reductions(&self, params: SessionRequest) -> RpcResult<Vec<Reduction>> {
        let ctx = self.session(&params.session_id).await?;
        self.reductions
            .list_reductions(&ctx)
            .await
            .map_err(to_rpc_error)
    }

    /// reduction.delete.v1
    pub async fn delete_reduction(
        &self,
        params: ReductionRequest,
    ) -> RpcResult<DeleteReductionResponse> {
        let ctx = self.session(&params.session_id).await?;
        self.reductions
            .delete_reduction(&ctx, params.reduction_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteReductionResponse {
            reduction_id: params.reduction_id,
            deleted: true,
        })
    }

    /// reduction.script.v1
    pub async fn script(&self, params: ReductionRequest) -> RpcResult<ScriptResponse> {
        let ctx = self.session(&params.session_id).await?;
        let script = self
            .reductions
            .script_for(&ctx, params.reduction_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(ScriptResponse {
            reduction_id: params.reduction_id,
            script,
        })
    }

    /// reduction.submit.v1
    pub async fn submit(&self, params: ReductionRequest) -> RpcResult<RemoteJob> {
        let mut ctx = self.session(&params.session_id).await?;
        let result = self
            .reductions
            .submit_reduction(&mut ctx, params.reduction_id)
            .await;
        self.commit(&ctx).await?;
        result.map_err(to_rpc_error)
    }

    /// reduction.submit_set.v1
    pub async fn submit_set(&self, params: SubmitSetRequest) -> RpcResult<JobSetOutcome> {
        let mut ctx = self.session(&params.session_id).await?;
        let result = self
            .reductions
            .submit_job_set(&mut ctx, &params.reduction_ids)
            .await;
        self.commit(&ctx).await?;
        result.map_err(to_rpc_error)
    }

    /// reduction.jobs.v1
    pub async fn reduction_jobs(&self, params: ReductionJobsRequest) -> RpcResult<Vec<RemoteJob>> {
        let ctx = self.session(&params.session_id).await?;
        let jobs = match params.reduction_id {
            Some(id) => self.reductions.jobs_for_reduction(&ctx, id).await,
            None => self.reductions.list_active_jobs(&ctx).await,
        };
        jobs.map_err(to_rpc_error)
    }

    /// catalog.instruments.v1
    pub async fn instruments(&self) -> RpcResult<Vec<InstrumentEntry>> {
        let names = self
            .catalog
            .instruments()
            .await
            .map_err(remote_to_rpc_error)?;

        Ok(names
            .into_iter()
            .map(|name| {
                let hooks = self.registry.get(&name);
                InstrumentEntry {
                    reduction_url: hooks.as_ref().map(|h| h.reduction_url()),
                    remote_jobs_url: hooks.as_ref().map(|h| h.remote_jobs_url()),
                    name,
                }
            })
            .collect())
    }

    /// catalog.experiments.v1
    pub async fn experiments(&self, params: ExperimentsRequest) -> RpcResult<Vec<String>> {
        self.catalog
            .experiments(&params.instrument)
            .await
            .map_err(remote_to_rpc_error)
    }

    /// catalog.experiment.v1
    pub async fn experiment(&self, params: ExperimentRequest) -> RpcResult<ExperimentResponse> {
        let metadata = self
            .catalog
            .experiment_metadata(&params.instrument, &params.ipts)
            .await
            .map_err(remote_to_rpc_error)?;

        let runs = if params.include_runs {
            self.catalog
                .runs(&params.instrument, &params.ipts)
                .await
                .map_err(remote_to_rpc_error)?
        } else {
            Vec::new()
        };

        let hooks = self.registry.get(&params.instrument);
        let runs = runs
            .into_iter()
            .map(|run| CatalogRun {
                reduce_url: hooks
                    .as_ref()
                    .map(|h| h.new_reduction_url(&run.id, &params.ipts)),
                run,
            })
            .collect();

        Ok(ExperimentResponse {
            instrument: params.instrument,
            ipts: params.ipts,
            metadata,
            runs,
        })
    }
}
