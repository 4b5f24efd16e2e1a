// Reduction workflow - create, script, submit, inspect

use crate::application::instrument::{InstrumentHooks, InstrumentRegistry};
use crate::application::parser;
use crate::application::plot_cache::PlotCache;
use crate::application::remote_client::RemoteJobClient;
use crate::domain::{
    JobInfo, NewRemoteJob, NewReduction, PlotArtifact, PlotKind, Reduction, ReductionId,
    ReductionParameters, RemoteJob, RequestContext, Transaction,
};
use crate::error::{AppError, Result};
use crate::port::{ReductionStore, RemoteJobStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Alert attached to job details when Fermi could not be reached
pub const FERMI_UNREACHABLE: &str = "Could not connect to Fermi";

/// Output directory used when a script is rendered outside a transaction
const PREVIEW_OUTPUT_DIR: &str = "/tmp";

/// Reduction creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReduction {
    pub instrument: String,
    pub name: String,
    pub data_file: String,
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Result of submitting several reductions under one transaction
#[derive(Debug, Clone, Serialize)]
pub struct JobSetOutcome {
    pub transaction: Transaction,
    pub submitted: Vec<RemoteJob>,
    /// Reductions whose submit failed, with the reason
    pub failed: Vec<(ReductionId, String)>,
}

/// Status, files and plots of one remote job
#[derive(Debug, Clone, Serialize)]
pub struct JobDetails {
    pub job_id: String,
    pub alert: Option<String>,
    pub info: Option<JobInfo>,
    pub transaction: Option<Transaction>,
    pub files: Vec<String>,
    pub plots: Vec<PlotArtifact>,
}

impl JobDetails {
    fn unreachable(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            alert: Some(FERMI_UNREACHABLE.to_string()),
            info: None,
            transaction: None,
            files: Vec::new(),
            plots: Vec::new(),
        }
    }
}

pub struct ReductionService {
    reductions: Arc<dyn ReductionStore>,
    jobs: Arc<dyn RemoteJobStore>,
    client: Arc<RemoteJobClient>,
    plots: Arc<PlotCache>,
    registry: Arc<InstrumentRegistry>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ReductionService {
    pub fn new(
        reductions: Arc<dyn ReductionStore>,
        jobs: Arc<dyn RemoteJobStore>,
        client: Arc<RemoteJobClient>,
        plots: Arc<PlotCache>,
        registry: Arc<InstrumentRegistry>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            reductions,
            jobs,
            client,
            plots,
            registry,
            time_provider,
        }
    }

    fn hooks(&self, instrument: &str) -> Result<Arc<dyn InstrumentHooks>> {
        self.registry
            .get(instrument)
            .ok_or_else(|| AppError::Validation(format!("unknown instrument: {}", instrument)))
    }

    async fn owned_reduction(&self, ctx: &RequestContext, id: ReductionId) -> Result<Reduction> {
        let reduction = self
            .reductions
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("reduction {}", id)))?;
        if !reduction.is_owned_by(&ctx.user) {
            return Err(AppError::Forbidden(format!(
                "reduction {} belongs to another user",
                id
            )));
        }
        Ok(reduction)
    }

    pub async fn create_reduction(
        &self,
        ctx: &RequestContext,
        req: CreateReduction,
    ) -> Result<Reduction> {
        let hooks = self.hooks(&req.instrument)?;
        let new = NewReduction {
            owner: ctx.user.clone(),
            instrument: hooks.name().to_string(),
            name: req.name,
            data_file: req.data_file,
            experiment: req.experiment.filter(|e| !e.trim().is_empty()),
            parameters: ReductionParameters::from_value(req.parameters)?,
        };
        new.validate()?;

        let reduction = self
            .reductions
            .create(&new, self.time_provider.now_millis())
            .await?;
        info!(reduction_id = reduction.id, owner = %reduction.owner, "Reduction created");
        Ok(reduction)
    }

    pub async fn list_reductions(&self, ctx: &RequestContext) -> Result<Vec<Reduction>> {
        self.reductions.list_by_owner(&ctx.user).await
    }

    /// Delete a reduction with its remote jobs and their cached plots
    pub async fn delete_reduction(&self, ctx: &RequestContext, id: ReductionId) -> Result<()> {
        self.owned_reduction(ctx, id).await?;
        if !self.reductions.delete(id).await? {
            return Err(AppError::NotFound(format!("reduction {}", id)));
        }
        info!(reduction_id = id, owner = %ctx.user, "Reduction deleted");
        Ok(())
    }

    /// Render the reduction script outside of any transaction
    pub async fn script_for(&self, ctx: &RequestContext, id: ReductionId) -> Result<String> {
        let reduction = self.owned_reduction(ctx, id).await?;
        let hooks = self.hooks(&reduction.instrument)?;
        Ok(hooks
            .script_builder()
            .build(&snapshot(&reduction), PREVIEW_OUTPUT_DIR))
    }

    /// Submit one reduction under a fresh transaction
    pub async fn submit_reduction(
        &self,
        ctx: &mut RequestContext,
        id: ReductionId,
    ) -> Result<RemoteJob> {
        let reduction = self.owned_reduction(ctx, id).await?;
        let builder = self.hooks(&reduction.instrument)?.script_builder();

        let transaction = self.client.start_transaction(ctx, true).await?;
        let parameters = snapshot(&reduction);
        let script = builder.build(&parameters, &transaction.directory);
        let job_id = self
            .client
            .submit_job(ctx, &transaction, &script, &builder.script_name(None))
            .await?;

        self.record_job(job_id, &reduction, &transaction, &parameters)
            .await
    }

    /// Submit several reductions under one new transaction.
    ///
    /// Ownership of every reduction is checked before anything is sent.
    pub async fn submit_job_set(
        &self,
        ctx: &mut RequestContext,
        ids: &[ReductionId],
    ) -> Result<JobSetOutcome> {
        if ids.is_empty() {
            return Err(AppError::Validation("job set is empty".to_string()));
        }

        let mut reductions = Vec::with_capacity(ids.len());
        for id in ids {
            let reduction = self.owned_reduction(ctx, *id).await?;
            let builder = self.hooks(&reduction.instrument)?.script_builder();
            reductions.push((reduction, builder));
        }

        let transaction = self.client.start_transaction(ctx, true).await?;
        let mut submitted = Vec::new();
        let mut failed = Vec::new();

        for (i, (reduction, builder)) in reductions.iter().enumerate() {
            let parameters = snapshot(reduction);
            let script = builder.build(&parameters, &transaction.directory);
            match self
                .client
                .submit_job(ctx, &transaction, &script, &builder.script_name(Some(i)))
                .await
            {
                Ok(job_id) => {
                    let job = self
                        .record_job(job_id, reduction, &transaction, &parameters)
                        .await?;
                    submitted.push(job);
                }
                Err(e) => failed.push((reduction.id, e.to_string())),
            }
        }

        info!(
            trans_id = %transaction.trans_id,
            submitted = submitted.len(),
            failed = failed.len(),
            "Job set submitted"
        );
        Ok(JobSetOutcome {
            transaction,
            submitted,
            failed,
        })
    }

    async fn record_job(
        &self,
        remote_id: String,
        reduction: &Reduction,
        transaction: &Transaction,
        parameters: &ReductionParameters,
    ) -> Result<RemoteJob> {
        let new = NewRemoteJob {
            remote_id,
            reduction_id: reduction.id,
            transaction_id: transaction.id,
            parameters: parameters.as_value(),
        };
        self.jobs.insert(&new, self.time_provider.now_millis()).await
    }

    /// Caller's jobs whose transaction is still active
    pub async fn list_active_jobs(&self, ctx: &RequestContext) -> Result<Vec<RemoteJob>> {
        self.jobs.list_active_for_owner(&ctx.user).await
    }

    pub async fn jobs_for_reduction(
        &self,
        ctx: &RequestContext,
        id: ReductionId,
    ) -> Result<Vec<RemoteJob>> {
        self.owned_reduction(ctx, id).await?;
        self.jobs.list_for_reduction(id).await
    }

    /// Status, output files and plots of a job.
    ///
    /// A missing or expired Fermi session is an error. Any other failed
    /// status query yields the "Could not connect to Fermi" alert instead.
    pub async fn job_details(&self, ctx: &RequestContext, job_id: &str) -> Result<JobDetails> {
        let info = match self.client.query_job(ctx, job_id).await {
            Ok(info) => info,
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => {
                warn!(job_id, error = %e, "Job details unavailable");
                return Ok(JobDetails::unreachable(job_id));
            }
        };

        let transaction = self.client.find_transaction(&info.trans_id).await?;
        if let Some(tx) = &transaction {
            if !tx.is_owned_by(&ctx.user) {
                return Err(AppError::Forbidden(format!(
                    "job {} belongs to another user",
                    job_id
                )));
            }
        }

        // Output files are only listed for transactions this portal started
        let files = match &transaction {
            Some(tx) => match self.client.query_files(ctx, &tx.trans_id).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(job_id, trans_id = %tx.trans_id, error = %e, "File list unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut plots = Vec::new();
        if let Some(job) = self.jobs.find_by_remote_id(job_id).await? {
            for file in &files {
                let Some(kind) = PlotKind::for_filename(file) else {
                    continue;
                };
                let fetched = self
                    .plots
                    .get_or_fetch(
                        &job,
                        file,
                        &ctx.user,
                        || self.client.download_file(ctx, &info.trans_id, file),
                        |content| parser::parse(kind, content),
                    )
                    .await;
                match fetched {
                    Ok(plot) => plots.push(plot),
                    Err(e) => warn!(job_id, file = %file, error = %e, "Plot unavailable"),
                }
            }
        }

        Ok(JobDetails {
            job_id: job_id.to_string(),
            alert: None,
            info: Some(info),
            transaction,
            files,
            plots,
        })
    }
}

/// Parameters as submitted, with the reduction's data file filled in
fn snapshot(reduction: &Reduction) -> ReductionParameters {
    let mut parameters = reduction.parameters.clone();
    if parameters.text("data_file").is_none() {
        parameters.set(
            "data_file",
            serde_json::Value::String(reduction.data_file.clone()),
        );
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_fills_data_file() {
        let reduction = Reduction {
            id: 1,
            owner: "alice".to_string(),
            instrument: "eqsans".to_string(),
            name: "r".to_string(),
            data_file: "4065".to_string(),
            experiment_id: 1,
            parameters: ReductionParameters::from_value(json!({"beam_radius": 3})).unwrap(),
            created_at: 0,
        };
        let params = snapshot(&reduction);
        assert_eq!(params.text("data_file"), Some("4065"));
        assert_eq!(params.number("beam_radius"), Some(3.0));
    }

    #[test]
    fn test_unreachable_details_carry_alert() {
        let details = JobDetails::unreachable("1001");
        assert_eq!(details.alert.as_deref(), Some(FERMI_UNREACHABLE));
        assert!(details.info.is_none());
    }
}
