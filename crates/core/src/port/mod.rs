// Port Layer - Interfaces for external dependencies

pub mod catalog_service;
pub mod id_provider; // For deterministic testing
pub mod plot_store;
pub mod reduction_store;
pub mod remote_job_store;
pub mod remote_service;
pub mod script_builder;
pub mod session_store;
pub mod time_provider;
pub mod transaction_store;

// Re-exports
pub use catalog_service::CatalogService;
pub use id_provider::{IdProvider, UuidProvider};
pub use plot_store::PlotStore;
pub use reduction_store::ReductionStore;
pub use remote_job_store::RemoteJobStore;
pub use remote_service::{Authentication, RemoteService, SubmitRequest};
pub use script_builder::ScriptBuilder;
pub use session_store::SessionStore;
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use transaction_store::TransactionStore;
