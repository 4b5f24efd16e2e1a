//! EQSANS Reduction Portal - Main Entry Point
//! JSON-RPC front end over the Fermi job service and the ICAT catalog

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

// Import workspace crates
use config::{LogFormat, PortalConfig};
use eqsans_api_rpc::{RpcHandler, RpcServer};
use eqsans_core::application::{InstrumentRegistry, PlotCache, ReductionService, RemoteJobClient};
use eqsans_core::port::id_provider::UuidProvider;
use eqsans_core::port::time_provider::SystemTimeProvider;
use eqsans_core::port::TimeProvider;
use eqsans_infra_http::{FermiClient, IcatClient};
use eqsans_infra_sqlite::{
    create_pool, run_migrations, SqlitePlotStore, SqliteReductionStore, SqliteRemoteJobStore,
    SqliteSessionStore, SqliteTransactionStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = PortalConfig::from_env().context("invalid configuration")?;

    // 2. Initialize logging (pretty or JSON, optional OpenTelemetry export)
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("eqsans=info"))
        .context("failed to create env filter")?;

    let (otel, otel_error) = match telemetry::layer::<Registry>() {
        Ok(layer) => (layer, None),
        Err(e) => (None, Some(e)),
    };
    let subscriber = tracing_subscriber::registry().with(otel).with(env_filter);
    match config.log_format {
        LogFormat::Json => subscriber.with(fmt::layer().json()).init(),
        LogFormat::Pretty => subscriber.with(fmt::layer().pretty()).init(),
    }

    info!("EQSANS reduction portal v{} starting...", VERSION);
    if let Some(e) = otel_error {
        warn!(error = %e, "OpenTelemetry disabled (continuing without it)");
    }

    // 3. Initialize database
    if let Some(dir) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create database directory {}", dir.display()))?;
    }
    info!(db_path = %config.db_path, "Initializing database...");

    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let registry = Arc::new(InstrumentRegistry::with_defaults());

    info!(fermi = %config.fermi.base_url, icat = %config.icat.base_url, "Remote services");
    let fermi = Arc::new(FermiClient::new(config.fermi.clone()).context("Fermi client")?);
    let icat = Arc::new(IcatClient::new(config.icat.clone()).context("ICAT client")?);

    let client = Arc::new(RemoteJobClient::new(
        fermi,
        Arc::new(SqliteTransactionStore::new(pool.clone())),
        time_provider.clone(),
    ));
    let plots = Arc::new(PlotCache::new(
        Arc::new(SqlitePlotStore::new(pool.clone())),
        time_provider.clone(),
    ));
    let reductions = Arc::new(ReductionService::new(
        Arc::new(SqliteReductionStore::new(pool.clone())),
        Arc::new(SqliteRemoteJobStore::new(pool.clone())),
        client.clone(),
        plots,
        registry.clone(),
        time_provider.clone(),
    ));

    let handler = RpcHandler::new(
        Arc::new(SqliteSessionStore::new(pool.clone())),
        client,
        reductions,
        icat,
        registry,
        Arc::new(UuidProvider),
        time_provider,
    );

    // 5. Start JSON-RPC server
    let (rpc_addr, rpc_handle) = RpcServer::new(config.rpc.clone(), handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
