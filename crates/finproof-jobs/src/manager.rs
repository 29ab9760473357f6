//! Job lifecycle facade
//!
//! [`JobManager`] is the only writer of job state. It normalizes input,
//! enforces the transition table of [`JobStatus`] and turns store-level
//! compare-and-set outcomes into the boolean and error results callers see.

use crate::error::{JobError, Result};
use crate::job::{
    Job, JobCounts, JobFilter, JobId, JobStatus, JobUpdate, RetentionPolicy, StoredResult,
};
use crate::store::JobStore;
use finproof_core::AnalysisResult;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Limit used by [`JobManager::running_jobs`]
const RUNNING_LIST_LIMIT: usize = 100;

/// Creates, transitions and deletes jobs
pub struct JobManager {
    store: Arc<dyn JobStore>,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for read-only callers
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    // =========== Creation ===========

    /// Create a pending job
    ///
    /// The analysis type is not checked against any registry; an unknown
    /// type fails later, at execution.
    pub async fn create_job(
        &self,
        symbol: &str,
        analysis_type: &str,
        parameters: Option<Value>,
    ) -> Result<JobId> {
        let symbol = normalize_symbol(symbol)?;
        let analysis_type = analysis_type.trim();
        if analysis_type.is_empty() {
            return Err(JobError::InvalidInput(
                "analysis type must not be empty".to_string(),
            ));
        }
        let parameters = match parameters {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(JobError::InvalidInput(format!(
                    "parameters must be a JSON object, got {other}"
                )));
            }
        };

        let id = self
            .store
            .insert(Job::pending(&symbol, analysis_type, parameters))
            .await?;
        info!(job_id = %id, symbol = %symbol, analysis_type = %analysis_type, "Job created");
        Ok(id)
    }

    /// Create one job per analysis type, sharing the parameters
    pub async fn create_jobs(
        &self,
        symbol: &str,
        analysis_types: &[String],
        parameters: Option<Value>,
    ) -> Result<Vec<JobId>> {
        let mut ids = Vec::with_capacity(analysis_types.len());
        for analysis_type in analysis_types {
            ids.push(
                self.create_job(symbol, analysis_type, parameters.clone())
                    .await?,
            );
        }
        Ok(ids)
    }

    /// Create a new pending job with the inputs of a failed or cancelled one
    pub async fn retry_job(&self, id: JobId) -> Result<JobId> {
        let job = self.require(id).await?;
        if !matches!(job.status, JobStatus::Failed | JobStatus::Cancelled) {
            return Err(JobError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Pending,
            });
        }
        let new_id = self
            .create_job(
                &job.symbol,
                &job.analysis_type,
                Some(Value::Object(job.parameters)),
            )
            .await?;
        info!(job_id = %id, retry_id = %new_id, "Job retried");
        Ok(new_id)
    }

    // =========== Queries ===========

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.store.get(id).await
    }

    /// Jobs matching `filter`, newest first
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.list(filter).await
    }

    pub async fn pending_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        self.list_jobs(&JobFilter::new().status(JobStatus::Pending).limit(limit))
            .await
    }

    pub async fn running_jobs(&self) -> Result<Vec<Job>> {
        self.list_jobs(
            &JobFilter::new()
                .status(JobStatus::Running)
                .limit(RUNNING_LIST_LIMIT),
        )
        .await
    }

    pub async fn completed_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        self.list_jobs(&JobFilter::new().status(JobStatus::Completed).limit(limit))
            .await
    }

    pub async fn job_counts(&self) -> Result<JobCounts> {
        self.store.counts().await
    }

    // =========== Transitions ===========

    /// Move a job to `status`
    ///
    /// `Pending -> Running` always starts at progress 0 and ignores
    /// `progress`; `Running -> Running` updates it. A transition into `Failed`
    /// requires a non-empty `error`. Illegal edges are rejected and leave the
    /// job untouched.
    pub async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<&str>,
    ) -> Result<Job> {
        let job = self.require(id).await?;
        let from = job.status;

        if from == JobStatus::Running && status == JobStatus::Running {
            let progress = progress.unwrap_or(job.progress);
            return self.transition(id, from, JobUpdate::progress(progress)).await;
        }
        if !from.can_transition_to(status) {
            return Err(JobError::InvalidTransition {
                id,
                from,
                to: status,
            });
        }

        let update = match status {
            // a run always starts from zero
            JobStatus::Running => JobUpdate::start(),
            JobStatus::Completed => JobUpdate::complete(),
            JobStatus::Failed => {
                let message = error
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .ok_or(JobError::MissingErrorMessage)?;
                JobUpdate::fail(message)
            }
            JobStatus::Cancelled => JobUpdate::cancel(),
            JobStatus::Pending => JobUpdate::to(JobStatus::Pending),
        };
        let job = self.transition(id, from, update).await?;
        debug!(job_id = %id, from = %from, to = %status, "Job status updated");
        Ok(job)
    }

    /// Claim a pending job for execution
    ///
    /// Returns `false` when the job is no longer pending, for example
    /// because another executor claimed it first.
    pub async fn start_job(&self, id: JobId) -> Result<bool> {
        let claimed = self
            .store
            .compare_and_set(id, JobStatus::Pending, JobUpdate::start())
            .await?;
        Ok(claimed.is_some())
    }

    /// Raise the progress of a running job; lower values are ignored
    pub async fn update_progress(&self, id: JobId, progress: u8) -> Result<()> {
        self.transition(id, JobStatus::Running, JobUpdate::progress(progress))
            .await
            .map(|_| ())
    }

    pub async fn complete_job(&self, id: JobId) -> Result<Job> {
        let job = self
            .update_status(id, JobStatus::Completed, None, None)
            .await?;
        info!(job_id = %id, "Job completed");
        Ok(job)
    }

    pub async fn fail_job(&self, id: JobId, message: &str) -> Result<Job> {
        let job = self
            .update_status(id, JobStatus::Failed, None, Some(message))
            .await?;
        warn!(job_id = %id, error = %message, "Job failed");
        Ok(job)
    }

    /// Cancel a job; `true` only if it was still pending
    pub async fn cancel_job(&self, id: JobId) -> Result<bool> {
        match self
            .store
            .compare_and_set(id, JobStatus::Pending, JobUpdate::cancel())
            .await
        {
            Ok(Some(_)) => {
                info!(job_id = %id, "Job cancelled");
                Ok(true)
            }
            Ok(None) | Err(JobError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // =========== Results and Deletion ===========

    /// Save a job's result, replacing an earlier one
    pub async fn save_result(&self, id: JobId, result: AnalysisResult) -> Result<()> {
        self.store.save_result(id, result).await
    }

    pub async fn get_result(&self, id: JobId) -> Result<Option<AnalysisResult>> {
        self.store.get_result(id).await
    }

    /// Results for a symbol, newest first
    pub async fn results_for_symbol(
        &self,
        symbol: &str,
        analysis_type: Option<&str>,
    ) -> Result<Vec<StoredResult>> {
        self.store.results_for_symbol(symbol, analysis_type).await
    }

    /// Delete a job and its result
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!(job_id = %id, "Job deleted");
        }
        Ok(deleted)
    }

    /// Delete terminal jobs beyond the newest ones the policy keeps
    ///
    /// Cancelled jobs count towards the failed allowance.
    pub async fn cleanup(&self, policy: RetentionPolicy) -> Result<usize> {
        let jobs = self.list_jobs(&JobFilter::new()).await?;

        let completed = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .skip(policy.keep_completed);
        let failed = jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Failed | JobStatus::Cancelled))
            .skip(policy.keep_failed);

        let mut deleted = 0;
        for job in completed.chain(failed) {
            if self.store.delete(job.id).await? {
                deleted += 1;
            }
        }
        info!(
            deleted,
            keep_completed = policy.keep_completed,
            keep_failed = policy.keep_failed,
            "Job cleanup finished"
        );
        Ok(deleted)
    }

    // =========== Helpers ===========

    async fn require(&self, id: JobId) -> Result<Job> {
        self.store.get(id).await?.ok_or(JobError::NotFound(id))
    }

    async fn transition(&self, id: JobId, from: JobStatus, update: JobUpdate) -> Result<Job> {
        let to = update.status;
        match self.store.compare_and_set(id, from, update).await? {
            Some(job) => Ok(job),
            None => {
                // Lost a race; report the state that won
                let current = self.require(id).await?.status;
                Err(JobError::InvalidTransition {
                    id,
                    from: current,
                    to,
                })
            }
        }
    }
}

fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(JobError::InvalidInput("symbol must not be empty".to_string()));
    }
    Ok(symbol)
}
