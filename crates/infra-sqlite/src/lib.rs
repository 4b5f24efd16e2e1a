// EQSANS Infrastructure - SQLite Adapter
// Implements: TransactionStore, RemoteJobStore, PlotStore, ReductionStore, SessionStore

mod connection;
mod error;
mod migration;
mod plot_store;
mod reduction_store;
mod remote_job_store;
mod session_store;
mod transaction_store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use plot_store::SqlitePlotStore;
pub use reduction_store::SqliteReductionStore;
pub use remote_job_store::SqliteRemoteJobStore;
pub use session_store::SqliteSessionStore;
pub use transaction_store::SqliteTransactionStore;

// Note: sqlx::Error conversion lives in `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
