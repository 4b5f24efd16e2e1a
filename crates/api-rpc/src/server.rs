//! JSON-RPC Server
//!
//! Serves the portal's JSON-RPC 2.0 methods over TCP on localhost.

use crate::handler::RpcHandler;
use crate::types::{
    AuthenticateRequest, CreateReductionRequest, DownloadRequest, ExperimentRequest,
    ExperimentsRequest, JobRequest, OpenSessionRequest, ReductionJobsRequest, ReductionRequest,
    SessionRequest, StartTransactionRequest, SubmitSetRequest, TransactionRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9528;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

/// Register `method`, parsing its params into `P` before calling the handler
fn register<P, R, F, Fut>(
    module: &mut RpcModule<()>,
    method: &'static str,
    handler: &Arc<RpcHandler>,
    call: F,
) -> Result<(), String>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Clone + Send + 'static,
    F: Fn(Arc<RpcHandler>, P) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ErrorObjectOwned>> + Send + 'static,
{
    let handler = handler.clone();
    module
        .register_async_method(method, move |params, _, _| {
            let handler = handler.clone();
            let call = call.clone();
            async move {
                let req: P = params.parse()?;
                call(handler, req).await
            }
        })
        .map_err(|e| e.to_string())?;
    Ok(())
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Build the method table
    pub fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());
        let h = &self.handler;

        // Sessions and Fermi
        register(&mut module, "session.open.v1", h, |h, req: OpenSessionRequest| async move {
            h.open_session(req).await
        })?;
        register(&mut module, "remote.authenticate.v1", h, |h, req: AuthenticateRequest| async move {
            h.authenticate(req).await
        })?;
        register(&mut module, "remote.status.v1", h, |h, req: SessionRequest| async move {
            h.status(req).await
        })?;
        register(&mut module, "remote.transaction.start.v1", h, |h, req: StartTransactionRequest| async move {
            h.start_transaction(req).await
        })?;
        register(&mut module, "remote.transaction.stop.v1", h, |h, req: TransactionRequest| async move {
            h.stop_transaction(req).await
        })?;
        register(&mut module, "remote.transactions.v1", h, |h, req: SessionRequest| async move {
            h.transactions(req).await
        })?;
        register(&mut module, "remote.jobs.v1", h, |h, req: SessionRequest| async move {
            h.remote_jobs(req).await
        })?;
        register(&mut module, "remote.job.v1", h, |h, req: JobRequest| async move {
            h.job(req).await
        })?;
        register(&mut module, "remote.files.v1", h, |h, req: TransactionRequest| async move {
            h.files(req).await
        })?;
        register(&mut module, "remote.download.v1", h, |h, req: DownloadRequest| async move {
            h.download(req).await
        })?;

        // Reductions
        register(&mut module, "reduction.create.v1", h, |h, req: CreateReductionRequest| async move {
            h.create_reduction(req).await
        })?;
        register(&mut module, "reduction.list.v1", h, |h, req: SessionRequest| async move {
            h.reductions(req).await
        })?;
        register(&mut module, "reduction.delete.v1", h, |h, req: ReductionRequest| async move {
            h.delete_reduction(req).await
        })?;
        register(&mut module, "reduction.script.v1", h, |h, req: ReductionRequest| async move {
            h.script(req).await
        })?;
        register(&mut module, "reduction.submit.v1", h, |h, req: ReductionRequest| async move {
            h.submit(req).await
        })?;
        register(&mut module, "reduction.submit_set.v1", h, |h, req: SubmitSetRequest| async move {
            h.submit_set(req).await
        })?;
        register(&mut module, "reduction.jobs.v1", h, |h, req: ReductionJobsRequest| async move {
            h.reduction_jobs(req).await
        })?;

        // Catalog (no session needed)
        register(&mut module, "catalog.instruments.v1", h, |h, _: serde_json::Value| async move {
            h.instruments().await
        })?;
        register(&mut module, "catalog.experiments.v1", h, |h, req: ExperimentsRequest| async move {
            h.experiments(req).await
        })?;
        register(&mut module, "catalog.experiment.v1", h, |h, req: ExperimentRequest| async move {
            h.experiment(req).await
        })?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Binds the configured host only; the default is localhost. Port 0
    /// picks a free port, reported in the returned address.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let module = self.module()?;
        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        info!(
            addr = %local_addr,
            methods = module.method_names().count(),
            "JSON-RPC server started successfully"
        );

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
