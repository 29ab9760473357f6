//! Job model and lifecycle rules

use chrono::{DateTime, Utc};
use finproof_core::AnalysisResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Store-assigned job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(JobId)
    }
}

/// Lifecycle state of a job
///
/// ```text
/// PENDING --> RUNNING --> COMPLETED
///    |           |
///    |           +------> FAILED
///    +--> FAILED
///    +--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> to` is a legal state transition
    ///
    /// `Running -> Running` is a progress update and not a transition.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// A unit of analysis work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Uppercase ticker
    pub symbol: String,
    /// Registry key of the analyzer to run
    pub analysis_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub status: JobStatus,
    /// 0 to 100
    pub progress: u8,
    /// Set iff status is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh pending job; the store assigns the id on insert
    pub fn pending(
        symbol: impl Into<String>,
        analysis_type: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            id: JobId(0),
            symbol: symbol.into(),
            analysis_type: analysis_type.into(),
            parameters,
            status: JobStatus::Pending,
            progress: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Wall time between start and completion, if both happened
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// State change applied atomically by a [`JobStore`](crate::JobStore)
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    /// New progress; `None` keeps the current value
    pub progress: Option<u8>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    /// PENDING -> RUNNING with progress reset
    pub fn start() -> Self {
        Self::to(JobStatus::Running).with_progress(0)
    }

    /// RUNNING -> RUNNING progress update
    pub fn progress(progress: u8) -> Self {
        Self::to(JobStatus::Running).with_progress(progress)
    }

    pub fn complete() -> Self {
        Self::to(JobStatus::Completed).with_progress(100)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::to(JobStatus::Failed)
        }
    }

    pub fn cancel() -> Self {
        Self::to(JobStatus::Cancelled)
    }

    pub fn to(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            error_message: None,
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Apply to `job`, stamping timestamps with `now`
    ///
    /// Progress never decreases while the status stays the same.
    pub fn apply(&self, job: &mut Job, now: DateTime<Utc>) {
        let unchanged = job.status == self.status;
        if let Some(progress) = self.progress {
            let progress = progress.min(100);
            job.progress = if unchanged {
                job.progress.max(progress)
            } else {
                progress
            };
        }
        if !unchanged {
            match self.status {
                JobStatus::Running => job.started_at = Some(now),
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                    job.completed_at = Some(now);
                }
                JobStatus::Pending => {}
            }
        }
        job.status = self.status;
        job.error_message = if self.status == JobStatus::Failed {
            self.error_message.clone()
        } else {
            None
        };
    }
}

/// Criteria for listing jobs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub symbol: Option<String>,
    pub status: Option<JobStatus>,
    pub analysis_type: Option<String>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into().trim().to_uppercase());
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn analysis_type(mut self, analysis_type: impl Into<String>) -> Self {
        self.analysis_type = Some(analysis_type.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.symbol.as_ref().is_none_or(|s| *s == job.symbol)
            && self.status.is_none_or(|s| s == job.status)
            && self
                .analysis_type
                .as_ref()
                .is_none_or(|t| *t == job.analysis_type)
    }
}

/// Number of jobs per status; every status is present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    counts: BTreeMap<JobStatus, usize>,
}

impl Default for JobCounts {
    fn default() -> Self {
        Self {
            counts: JobStatus::ALL.iter().map(|s| (*s, 0)).collect(),
        }
    }
}

impl JobCounts {
    pub fn add(&mut self, status: JobStatus) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    pub fn get(&self, status: JobStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobStatus, usize)> + '_ {
        self.counts.iter().map(|(s, c)| (*s, *c))
    }
}

impl<'a> FromIterator<&'a Job> for JobCounts {
    fn from_iter<I: IntoIterator<Item = &'a Job>>(iter: I) -> Self {
        let mut counts = Self::default();
        for job in iter {
            counts.add(job.status);
        }
        counts
    }
}

/// How many terminal jobs [`cleanup`](crate::JobManager::cleanup) keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Newest completed jobs kept
    pub keep_completed: usize,
    /// Newest failed or cancelled jobs kept
    pub keep_failed: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_completed: 20,
            keep_failed: 10,
        }
    }
}

/// A saved result with the job it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub job_id: JobId,
    pub result: AnalysisResult,
}
