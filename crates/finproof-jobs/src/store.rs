//! Job persistence
//!
//! [`JobStore`] is the single shared mutable resource of the job subsystem.
//! Every state change goes through [`JobStore::compare_and_set`], which checks
//! the expected status and applies the update under the store's exclusive
//! lock, so two executors can never both claim the same job.

use crate::error::{JobError, Result};
use crate::job::{Job, JobCounts, JobFilter, JobId, JobStatus, JobUpdate, StoredResult};
use async_trait::async_trait;
use chrono::Utc;
use finproof_core::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Storage backend for jobs and their results
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job and return its assigned id
    async fn insert(&self, job: Job) -> Result<JobId>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Jobs matching `filter`, newest first
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Apply `update` iff the job is currently in `expected`
    ///
    /// Returns the updated job, or `None` when the status did not match.
    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Option<Job>>;

    /// Delete a job and its result; `false` if it did not exist
    async fn delete(&self, id: JobId) -> Result<bool>;

    /// Save the result for a job, replacing any earlier one
    async fn save_result(&self, id: JobId, result: AnalysisResult) -> Result<()>;

    async fn get_result(&self, id: JobId) -> Result<Option<AnalysisResult>>;

    /// Results for `symbol`, optionally of one analysis type, newest first
    async fn results_for_symbol(
        &self,
        symbol: &str,
        analysis_type: Option<&str>,
    ) -> Result<Vec<StoredResult>>;

    async fn counts(&self) -> Result<JobCounts>;
}

/// Jobs and results guarded by a store's lock
#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    jobs: BTreeMap<JobId, Job>,
    results: BTreeMap<JobId, AnalysisResult>,
}

/// On-disk layout of [`FileJobStore`]
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    jobs: Vec<Job>,
    #[serde(default)]
    results: Vec<StoredResult>,
}

impl StoreState {
    fn insert(&mut self, mut job: Job) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        job.id = id;
        self.jobs.insert(id, job);
        id
    }

    fn list(&self, filter: &JobFilter) -> Vec<Job> {
        self.jobs
            .values()
            .rev()
            .filter(|job| filter.matches(job))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn compare_and_set(
        &mut self,
        id: JobId,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<Option<Job>> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if job.status != expected {
            return Ok(None);
        }
        update.apply(job, Utc::now());
        Ok(Some(job.clone()))
    }

    fn delete(&mut self, id: JobId) -> bool {
        self.results.remove(&id);
        self.jobs.remove(&id).is_some()
    }

    fn save_result(&mut self, id: JobId, result: AnalysisResult) -> Result<()> {
        if !self.jobs.contains_key(&id) {
            return Err(JobError::NotFound(id));
        }
        self.results.insert(id, result);
        Ok(())
    }

    fn results_for_symbol(&self, symbol: &str, analysis_type: Option<&str>) -> Vec<StoredResult> {
        let symbol = symbol.trim().to_uppercase();
        let mut found: Vec<StoredResult> = self
            .results
            .iter()
            .filter(|(_, r)| r.symbol == symbol)
            .filter(|(_, r)| analysis_type.is_none_or(|t| r.analysis_type == t))
            .map(|(id, r)| StoredResult {
                job_id: *id,
                result: r.clone(),
            })
            .collect();
        found.sort_by(|a, b| {
            b.result
                .timestamp
                .cmp(&a.result.timestamp)
                .then(b.job_id.cmp(&a.job_id))
        });
        found
    }

    fn counts(&self) -> JobCounts {
        self.jobs.values().collect()
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_id: self.next_id,
            jobs: self.jobs.values().cloned().collect(),
            results: self
                .results
                .iter()
                .map(|(id, r)| StoredResult {
                    job_id: *id,
                    result: r.clone(),
                })
                .collect(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let max_id = snapshot.jobs.iter().map(|j| j.id.0).max().unwrap_or(0);
        Self {
            next_id: snapshot.next_id.max(max_id),
            jobs: snapshot.jobs.into_iter().map(|j| (j.id, j)).collect(),
            results: snapshot
                .results
                .into_iter()
                .map(|s| (s.job_id, s.result))
                .collect(),
        }
    }
}

// =========== In-Memory Store ===========

/// Process-local store; contents are lost on exit
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: RwLock<StoreState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<JobId> {
        Ok(self.state.write().await.insert(job))
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        Ok(self.state.read().await.list(filter))
    }

    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Option<Job>> {
        self.state
            .write()
            .await
            .compare_and_set(id, expected, &update)
    }

    async fn delete(&self, id: JobId) -> Result<bool> {
        Ok(self.state.write().await.delete(id))
    }

    async fn save_result(&self, id: JobId, result: AnalysisResult) -> Result<()> {
        self.state.write().await.save_result(id, result)
    }

    async fn get_result(&self, id: JobId) -> Result<Option<AnalysisResult>> {
        Ok(self.state.read().await.results.get(&id).cloned())
    }

    async fn results_for_symbol(
        &self,
        symbol: &str,
        analysis_type: Option<&str>,
    ) -> Result<Vec<StoredResult>> {
        Ok(self
            .state
            .read()
            .await
            .results_for_symbol(symbol, analysis_type))
    }

    async fn counts(&self) -> Result<JobCounts> {
        Ok(self.state.read().await.counts())
    }
}

// =========== JSON File Store ===========

/// Store persisted as a single JSON document
///
/// Nothing is cached between calls. Every operation takes an advisory lock on
/// a `.lock` file next to the document and reloads it; mutations then write
/// the new state through a temporary file and a rename before the lock is
/// released. Several processes can therefore share one file, and a failed
/// write leaves the stored state untouched. Without `flock` (non-unix targets)
/// only calls within one process are serialized.
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    lock_path: PathBuf,
    local: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Shared,
    Exclusive,
}

impl FileJobStore {
    /// Open the store at `path`, starting empty if the file does not exist
    ///
    /// Fails if the existing document cannot be parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        let store = Self {
            path,
            lock_path: PathBuf::from(lock_path),
            local: Arc::default(),
        };

        let jobs = store.read(|state| state.jobs.len()).await?;
        info!(path = %store.path.display(), jobs, "Job store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreState) -> T + Send + 'static,
    {
        self.locked(Access::Shared, move |state, _| Ok(op(&*state))).await
    }

    /// Run `op` on a freshly loaded state and persist it when `op` reports a change
    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> Result<(T, bool)> + Send + 'static,
    {
        self.locked(Access::Exclusive, move |state, path| {
            let (value, changed) = op(state)?;
            if changed {
                persist(path, state)?;
            }
            Ok(value)
        })
        .await
    }

    async fn locked<T, F>(&self, access: Access, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState, &Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        let local = Arc::clone(&self.local);

        tokio::task::spawn_blocking(move || {
            let _guard = local.lock().unwrap_or_else(PoisonError::into_inner);
            let _lock = FileLock::acquire(&lock_path, access)?;
            let mut state = load(&path)?;
            op(&mut state, &path)
        })
        .await
        .map_err(|e| JobError::Store(format!("job store task failed: {e}")))?
    }
}

fn load(path: &Path) -> Result<StoreState> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            Ok(StoreState::from_snapshot(snapshot))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Job store file missing, starting empty");
            Ok(StoreState::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

fn persist(path: &Path, state: &StoreState) -> Result<()> {
    let json = serde_json::to_string_pretty(&state.to_snapshot())?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), jobs = state.jobs.len(), "Job store persisted");
    Ok(())
}

/// Advisory lock on the store's lock file, released when dropped
struct FileLock {
    _file: File,
}

impl FileLock {
    fn acquire(path: &Path, access: Access) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        flock(&file, access)?;
        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn flock(file: &File, access: Access) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let operation = match access {
        Access::Shared => libc::LOCK_SH,
        Access::Exclusive => libc::LOCK_EX,
    };
    loop {
        // SAFETY: the descriptor belongs to `file`, which outlives the call
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock(_file: &File, _access: Access) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn insert(&self, job: Job) -> Result<JobId> {
        self.mutate(move |state| Ok((state.insert(job), true))).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.read(move |state| state.jobs.get(&id).cloned()).await
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let filter = filter.clone();
        self.read(move |state| state.list(&filter)).await
    }

    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Option<Job>> {
        self.mutate(move |state| {
            let updated = state.compare_and_set(id, expected, &update)?;
            let changed = updated.is_some();
            Ok((updated, changed))
        })
        .await
    }

    async fn delete(&self, id: JobId) -> Result<bool> {
        self.mutate(move |state| {
            let deleted = state.delete(id);
            Ok((deleted, deleted))
        })
        .await
    }

    async fn save_result(&self, id: JobId, result: AnalysisResult) -> Result<()> {
        self.mutate(move |state| {
            state.save_result(id, result)?;
            Ok(((), true))
        })
        .await
    }

    async fn get_result(&self, id: JobId) -> Result<Option<AnalysisResult>> {
        self.read(move |state| state.results.get(&id).cloned()).await
    }

    async fn results_for_symbol(
        &self,
        symbol: &str,
        analysis_type: Option<&str>,
    ) -> Result<Vec<StoredResult>> {
        let symbol = symbol.to_string();
        let analysis_type = analysis_type.map(str::to_string);
        self.read(move |state| state.results_for_symbol(&symbol, analysis_type.as_deref()))
            .await
    }

    async fn counts(&self) -> Result<JobCounts> {
        self.read(StoreState::counts).await
    }
}
