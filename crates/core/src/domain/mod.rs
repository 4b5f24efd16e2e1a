// Domain Layer - Pure business logic and entities

pub mod catalog;
pub mod error;
pub mod plot;
pub mod reduction;
pub mod remote_job;
pub mod session;
pub mod timestamp;
pub mod transaction;

// Re-exports
pub use catalog::{ExperimentMetadata, RunInfo};
pub use error::DomainError;
pub use plot::{Grid2d, IqPoint, PlotArtifact, PlotData, PlotKind};
pub use reduction::{
    Experiment, ExperimentId, NewReduction, Reduction, ReductionId, ReductionParameters,
    UNCATEGORIZED,
};
pub use remote_job::{JobInfo, JobStatus, NewRemoteJob, RemoteJob, RemoteJobId};
pub use session::{AuthStatus, Credentials, RequestContext, SessionId, SessionToken};
pub use timestamp::decode_time;
pub use transaction::{RemoteTransaction, Transaction, TransactionId};
