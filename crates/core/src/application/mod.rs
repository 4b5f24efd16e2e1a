// Application Layer - Use Cases and Business Logic

pub mod instrument;
pub mod parser;
pub mod plot_cache;
pub mod reduction;
pub mod remote_client;
pub mod script;

// Re-exports
pub use instrument::{EqsansHooks, InstrumentHooks, InstrumentRegistry};
pub use plot_cache::PlotCache;
pub use reduction::{CreateReduction, JobDetails, JobSetOutcome, ReductionService, FERMI_UNREACHABLE};
pub use remote_client::{LocalStop, RemoteJobClient, StopOutcome};
pub use script::EqsansScriptBuilder;
