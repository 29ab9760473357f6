//! Job executor
//!
//! Drives one job from PENDING to a terminal state:
//!
//! 1. Claim the job (atomic PENDING -> RUNNING), progress 5
//! 2. Load market data, progress 20
//! 3. Resolve the analyzer from the registry, progress 30
//! 4. Resolve timeframe and custom parameters, validate the dataset, progress 40
//! 5. Run the analyzer; its own 0-100 progress maps onto 40-90
//! 6. Save the result and complete the job, progress 100
//!
//! Any failure along the way fails the job with a readable message. Nothing
//! crosses the executor boundary as an error or a panic.

use crate::job::{Job, JobId, JobStatus};
use crate::manager::JobManager;
use finproof_core::{
    AnalysisParameters, AnalysisResult, Analyzer, MarketDataProvider, Timeframe,
};
use finproof_registry::{AnalyzerRegistry, AutoSelector, SelectionReport};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const PROGRESS_CLAIMED: u8 = 5;
const PROGRESS_DATA_LOADED: u8 = 20;
const PROGRESS_ANALYZER_RESOLVED: u8 = 30;
const PROGRESS_ANALYSIS_START: u8 = 40;
const PROGRESS_ANALYSIS_END: u8 = 90;

/// Configuration for job execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// History period requested from the data provider
    pub data_period: String,

    /// Timeframe used when a job does not ask for one
    pub default_timeframe: Timeframe,

    /// Deadline for a single `analyze` call
    pub analyzer_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            data_period: "1y".to_string(),
            default_timeframe: Timeframe::Medium,
            analyzer_timeout: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_data_period(mut self, period: impl Into<String>) -> Self {
        self.data_period = period.into();
        self
    }

    pub fn with_default_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.default_timeframe = timeframe;
        self
    }

    pub fn with_analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.analyzer_timeout = Some(timeout);
        self
    }
}

/// Tally of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchSummary {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Per-analysis outcome of [`JobExecutor::execute_for_symbol`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolRunOutcome {
    Succeeded {
        job_id: JobId,
        summary: String,
        confidence: f64,
    },
    Failed {
        job_id: JobId,
        error: String,
    },
}

impl SymbolRunOutcome {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Succeeded { job_id, .. } | Self::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Runs jobs against registered analyzers
pub struct JobExecutor {
    manager: Arc<JobManager>,
    registry: Arc<AnalyzerRegistry>,
    provider: Arc<dyn MarketDataProvider>,
    config: ExecutorConfig,
    selector: AutoSelector,
}

impl JobExecutor {
    pub fn new(
        manager: Arc<JobManager>,
        registry: Arc<AnalyzerRegistry>,
        provider: Arc<dyn MarketDataProvider>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            manager,
            registry,
            provider,
            config,
            selector: AutoSelector::new(),
        }
    }

    /// Replace the auto-selector used by [`auto_select`](Self::auto_select)
    pub fn with_selector(mut self, selector: AutoSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    /// Execute a single pending job
    ///
    /// Returns `true` when the job completed. Returns `false` without touching
    /// anything when the job is missing, not pending, or claimed by another
    /// caller first, and `false` after failing the job otherwise.
    pub async fn execute_job(&self, id: JobId) -> bool {
        let job = match self.manager.get_job(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(job_id = %id, "Job not found, nothing to execute");
                return false;
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Failed to load job");
                return false;
            }
        };
        if job.status != JobStatus::Pending {
            debug!(job_id = %id, status = %job.status, "Job is not pending, skipping");
            return false;
        }

        match self.manager.start_job(id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %id, "Job claimed by another executor");
                return false;
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Failed to claim job");
                return false;
            }
        }
        info!(
            job_id = %id,
            symbol = %job.symbol,
            analysis_type = %job.analysis_type,
            "Job started"
        );
        self.set_progress(id, PROGRESS_CLAIMED).await;

        let result = match self.run(&job).await {
            Ok(result) => result,
            Err(message) => {
                self.fail(id, &message).await;
                return false;
            }
        };

        let degraded = result.is_degraded();
        let confidence = result.confidence;
        if let Err(e) = self.manager.save_result(id, result).await {
            self.fail(id, &format!("failed to save result: {e}")).await;
            return false;
        }
        match self.manager.complete_job(id).await {
            Ok(_) => {
                info!(job_id = %id, confidence, degraded, "Job finished");
                true
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Failed to complete job");
                self.fail(id, &format!("failed to complete job: {e}")).await;
                false
            }
        }
    }

    /// Steps 2 to 5; an `Err` is the message the job fails with
    async fn run(&self, job: &Job) -> Result<AnalysisResult, String> {
        let id = job.id;

        let dataset = self
            .provider
            .get_market_data(&job.symbol, &self.config.data_period)
            .await;
        if dataset.is_empty() {
            return Err(format!("no market data available for {}", job.symbol));
        }
        debug!(job_id = %id, bars = dataset.len(), "Market data loaded");
        self.set_progress(id, PROGRESS_DATA_LOADED).await;

        let analyzer = self
            .registry
            .get(&job.analysis_type)
            .ok_or_else(|| format!("analyzer '{}' not found", job.analysis_type))?;
        self.set_progress(id, PROGRESS_ANALYZER_RESOLVED).await;

        let descriptor = analyzer.descriptor();
        let timeframe = self.timeframe_for(job);
        if !descriptor.supports(timeframe) {
            debug!(
                job_id = %id,
                analyzer = %descriptor.name,
                timeframe = %timeframe,
                "Timeframe not declared by analyzer, running anyway"
            );
        }
        let custom = descriptor
            .parameters
            .resolve(Some(&Value::Object(job.parameters.clone())))
            .map_err(|e| e.to_string())?;

        let errors = analyzer.validate(&dataset);
        if !errors.is_empty() {
            return Err(errors.join("; "));
        }
        self.set_progress(id, PROGRESS_ANALYSIS_START).await;

        let params = AnalysisParameters::new(&job.symbol, dataset)
            .with_timeframe(timeframe)
            .with_custom(custom);
        let result = self.invoke(id, analyzer, params).await?;
        self.set_progress(id, PROGRESS_ANALYSIS_END).await;
        Ok(result)
    }

    /// Run `analyze` with progress forwarding, panic capture and the deadline
    async fn invoke(
        &self,
        id: JobId,
        analyzer: Arc<dyn Analyzer>,
        params: AnalysisParameters,
    ) -> Result<AnalysisResult, String> {
        let name = analyzer.name().to_string();
        let limit = self.config.analyzer_timeout;
        let (tx, rx) = watch::channel(0u8);

        let analysis = async move {
            // never blocks; only forward increases
            let reporter = move |percent: u8| {
                tx.send_if_modified(|current| {
                    let advanced = percent > *current;
                    if advanced {
                        *current = percent;
                    }
                    advanced
                });
            };
            let run = AssertUnwindSafe(analyzer.analyze(&params, &reporter)).catch_unwind();
            match limit {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            }
        };
        let (outcome, ()) = tokio::join!(analysis, self.forward_progress(id, rx));

        match outcome {
            Some(Ok(result)) => Ok(result),
            Some(Err(panic)) => Err(format!(
                "analyzer '{name}' panicked: {}",
                panic_message(panic.as_ref())
            )),
            None => Err(format!(
                "analysis timed out after {}s",
                limit.unwrap_or_default().as_secs_f64()
            )),
        }
    }

    /// Map analyzer progress onto the job until the reporter is dropped
    async fn forward_progress(&self, id: JobId, mut rx: watch::Receiver<u8>) {
        let span = u16::from(PROGRESS_ANALYSIS_END - PROGRESS_ANALYSIS_START);
        while rx.changed().await.is_ok() {
            let analyzer_pct = u16::from(*rx.borrow_and_update());
            let job_pct = u16::from(PROGRESS_ANALYSIS_START) + analyzer_pct * span / 100;
            self.set_progress(id, u8::try_from(job_pct).unwrap_or(PROGRESS_ANALYSIS_END))
                .await;
        }
    }

    fn timeframe_for(&self, job: &Job) -> Timeframe {
        match job
            .parameters
            .get(Timeframe::PARAM_KEY)
            .and_then(Value::as_str)
        {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(job_id = %job.id, error = %e, "Ignoring invalid timeframe");
                self.config.default_timeframe
            }),
            None => self.config.default_timeframe,
        }
    }

    async fn set_progress(&self, id: JobId, progress: u8) {
        if let Err(e) = self.manager.update_progress(id, progress).await {
            debug!(job_id = %id, progress, error = %e, "Progress update skipped");
        }
    }

    async fn fail(&self, id: JobId, message: &str) {
        if let Err(e) = self.manager.fail_job(id, message).await {
            error!(job_id = %id, error = %e, message = %message, "Failed to record job failure");
        }
    }

    // =========== Batch Execution ===========

    /// Execute up to `max_jobs` pending jobs one after another, oldest first
    pub async fn execute_all_pending(&self, max_jobs: usize) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for id in self.pending_ids(max_jobs).await {
            summary.record(self.execute_job(id).await);
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total,
            "Pending jobs executed"
        );
        summary
    }

    /// Execute up to `max_jobs` pending jobs with at most `concurrency` in flight
    pub async fn execute_pending_concurrently(
        &self,
        max_jobs: usize,
        concurrency: usize,
    ) -> BatchSummary {
        let outcomes: Vec<bool> = stream::iter(self.pending_ids(max_jobs).await)
            .map(|id| self.execute_job(id))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for success in outcomes {
            summary.record(success);
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total,
            concurrency,
            "Pending jobs executed concurrently"
        );
        summary
    }

    async fn pending_ids(&self, max_jobs: usize) -> Vec<JobId> {
        match self.manager.pending_jobs(max_jobs).await {
            Ok(jobs) => jobs.iter().rev().map(|j| j.id).collect(),
            Err(e) => {
                error!(error = %e, "Failed to list pending jobs");
                Vec::new()
            }
        }
    }

    /// Create and run one job per analysis type for `symbol`
    pub async fn execute_for_symbol(
        &self,
        symbol: &str,
        analysis_types: &[String],
    ) -> crate::Result<BTreeMap<String, SymbolRunOutcome>> {
        self.execute_for_symbol_with(symbol, analysis_types, None)
            .await
    }

    /// [`execute_for_symbol`](Self::execute_for_symbol) with shared parameters
    pub async fn execute_for_symbol_with(
        &self,
        symbol: &str,
        analysis_types: &[String],
        parameters: Option<Value>,
    ) -> crate::Result<BTreeMap<String, SymbolRunOutcome>> {
        let mut outcomes = BTreeMap::new();
        for analysis_type in analysis_types {
            let job_id = self
                .manager
                .create_job(symbol, analysis_type, parameters.clone())
                .await?;

            let outcome = if self.execute_job(job_id).await {
                match self.manager.get_result(job_id).await? {
                    Some(result) => SymbolRunOutcome::Succeeded {
                        job_id,
                        summary: result.summary,
                        confidence: result.confidence,
                    },
                    None => SymbolRunOutcome::Succeeded {
                        job_id,
                        summary: "no details available".to_string(),
                        confidence: 0.0,
                    },
                }
            } else {
                let error = self
                    .manager
                    .get_job(job_id)
                    .await?
                    .and_then(|j| j.error_message)
                    .unwrap_or_else(|| "unknown error".to_string());
                SymbolRunOutcome::Failed { job_id, error }
            };
            outcomes.insert(analysis_type.clone(), outcome);
        }
        Ok(outcomes)
    }

    /// Suggest analyzers for `symbol` from its recent market data
    ///
    /// `None` when no data is available.
    pub async fn auto_select(&self, symbol: &str) -> Option<SelectionReport> {
        let symbol = symbol.trim().to_uppercase();
        let dataset = self
            .provider
            .get_market_data(&symbol, &self.config.data_period)
            .await;
        if dataset.is_empty() {
            warn!(symbol = %symbol, "No market data for auto-selection");
            return None;
        }
        let report = self.selector.select(&dataset, &self.registry.list_names());
        debug!(symbol = %symbol, selected = ?report.names(), "Analyzers auto-selected");
        Some(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JobError, Result as JobResult};
    use crate::job::{JobCounts, JobFilter, JobUpdate, StoredResult};
    use crate::store::{InMemoryJobStore, JobStore};
    use async_trait::async_trait;
    use finproof_core::{
        AnalysisCategory, AnalyzerDescriptor, MarketDataset, ParamSpec, ProgressReporter,
        SignalType, TickerInfo,
    };
    use finproof_market::StaticMarketData;
    use finproof_registry::RegistryBuilder;
    use mockall::mock;
    use serde_json::json;

    mock! {
        Provider {}

        #[async_trait]
        impl MarketDataProvider for Provider {
            async fn get_market_data(&self, symbol: &str, period: &str) -> MarketDataset;
            async fn get_ticker_info(&self, symbol: &str) -> TickerInfo;
        }
    }

    /// Always succeeds with a confident buy
    struct DummyOk {
        descriptor: AnalyzerDescriptor,
    }

    impl DummyOk {
        fn new() -> Self {
            Self {
                descriptor: AnalyzerDescriptor::new("dummy_ok", "Dummy", AnalysisCategory::Technical)
                    .with_min_data_points(10)
                    .with_parameter(ParamSpec::integer("window", 20).range(5.0, 50.0)),
            }
        }
    }

    #[async_trait]
    impl Analyzer for DummyOk {
        fn descriptor(&self) -> &AnalyzerDescriptor {
            &self.descriptor
        }

        async fn analyze(
            &self,
            params: &AnalysisParameters,
            progress: &dyn ProgressReporter,
        ) -> AnalysisResult {
            progress.report(50);
            progress.report(100);
            AnalysisResult::new("dummy_ok", &params.symbol, "all good")
                .with_confidence(0.9)
                .with_recommendation(SignalType::Buy)
                .with_data("window", json!(params.custom.i64_or("window", 0)))
                .with_data("timeframe", json!(params.timeframe.as_str()))
        }
    }

    struct Panicky {
        descriptor: AnalyzerDescriptor,
    }

    #[async_trait]
    impl Analyzer for Panicky {
        fn descriptor(&self) -> &AnalyzerDescriptor {
            &self.descriptor
        }

        async fn analyze(
            &self,
            _params: &AnalysisParameters,
            _progress: &dyn ProgressReporter,
        ) -> AnalysisResult {
            panic!("index out of range")
        }
    }

    struct Slow {
        descriptor: AnalyzerDescriptor,
    }

    #[async_trait]
    impl Analyzer for Slow {
        fn descriptor(&self) -> &AnalyzerDescriptor {
            &self.descriptor
        }

        async fn analyze(
            &self,
            params: &AnalysisParameters,
            _progress: &dyn ProgressReporter,
        ) -> AnalysisResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            AnalysisResult::new("slow", &params.symbol, "finally")
        }
    }

    /// In-memory store whose writes into `Completed` always fail
    #[derive(Default)]
    struct CompletionFails {
        inner: InMemoryJobStore,
    }

    #[async_trait]
    impl JobStore for CompletionFails {
        async fn insert(&self, job: Job) -> JobResult<JobId> {
            self.inner.insert(job).await
        }

        async fn get(&self, id: JobId) -> JobResult<Option<Job>> {
            self.inner.get(id).await
        }

        async fn list(&self, filter: &JobFilter) -> JobResult<Vec<Job>> {
            self.inner.list(filter).await
        }

        async fn compare_and_set(
            &self,
            id: JobId,
            expected: JobStatus,
            update: JobUpdate,
        ) -> JobResult<Option<Job>> {
            if update.status == JobStatus::Completed {
                return Err(JobError::Store("disk full".to_string()));
            }
            self.inner.compare_and_set(id, expected, update).await
        }

        async fn delete(&self, id: JobId) -> JobResult<bool> {
            self.inner.delete(id).await
        }

        async fn save_result(&self, id: JobId, result: AnalysisResult) -> JobResult<()> {
            self.inner.save_result(id, result).await
        }

        async fn get_result(&self, id: JobId) -> JobResult<Option<AnalysisResult>> {
            self.inner.get_result(id).await
        }

        async fn results_for_symbol(
            &self,
            symbol: &str,
            analysis_type: Option<&str>,
        ) -> JobResult<Vec<StoredResult>> {
            self.inner.results_for_symbol(symbol, analysis_type).await
        }

        async fn counts(&self) -> JobResult<JobCounts> {
            self.inner.counts().await
        }
    }

    fn registry() -> Arc<AnalyzerRegistry> {
        let mut builder = RegistryBuilder::new();
        builder
            .register(|| Arc::new(DummyOk::new()) as Arc<dyn Analyzer>)
            .unwrap()
            .register(|| {
                Arc::new(Panicky {
                    descriptor: AnalyzerDescriptor::new(
                        "panicky",
                        "Panicky",
                        AnalysisCategory::Research,
                    ),
                }) as Arc<dyn Analyzer>
            })
            .unwrap()
            .register(|| {
                Arc::new(Slow {
                    descriptor: AnalyzerDescriptor::new("slow", "Slow", AnalysisCategory::Research),
                }) as Arc<dyn Analyzer>
            })
            .unwrap();
        Arc::new(builder.build())
    }

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i % 7) as f64).collect()
    }

    fn executor_with(provider: Arc<dyn MarketDataProvider>, config: ExecutorConfig) -> JobExecutor {
        let manager = Arc::new(JobManager::new(Arc::new(InMemoryJobStore::new())));
        JobExecutor::new(manager, registry(), provider, config)
    }

    fn executor() -> JobExecutor {
        let provider = StaticMarketData::new()
            .with_closes("AAPL", &closes(60))
            .with_closes("MSFT", &closes(5));
        executor_with(Arc::new(provider), ExecutorConfig::default())
    }

    async fn job(executor: &JobExecutor, id: JobId) -> Job {
        executor.manager().get_job(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_successful_job() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("aapl", "dummy_ok", None)
            .await
            .unwrap();

        assert!(executor.execute_job(id).await);

        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error_message.is_none());

        let result = executor.manager().get_result(id).await.unwrap().unwrap();
        assert!((result.confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.recommendation, SignalType::Buy);
        assert_eq!(result.symbol, "AAPL");
        assert_eq!(result.data["window"], json!(20));
        assert_eq!(result.data["timeframe"], json!("medium"));
    }

    #[tokio::test]
    async fn test_job_that_cannot_complete_is_failed() {
        let provider = StaticMarketData::new().with_closes("AAPL", &closes(60));
        let manager = Arc::new(JobManager::new(Arc::new(CompletionFails::default())));
        let executor = JobExecutor::new(
            manager,
            registry(),
            Arc::new(provider),
            ExecutorConfig::default(),
        );
        let id = executor
            .manager()
            .create_job("AAPL", "dummy_ok", None)
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);

        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_parameters_reach_the_analyzer() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("AAPL", "dummy_ok", Some(json!({"window": 30, "timeframe": "long"})))
            .await
            .unwrap();

        assert!(executor.execute_job(id).await);
        let result = executor.manager().get_result(id).await.unwrap().unwrap();
        assert_eq!(result.data["window"], json!(30));
        assert_eq!(result.data["timeframe"], json!("long"));
    }

    #[tokio::test]
    async fn test_invalid_parameter_fails_job() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("AAPL", "dummy_ok", Some(json!({"window": 500})))
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);
        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        let message = job.error_message.unwrap();
        assert!(message.contains("window") && message.contains("maximum"));
    }

    #[tokio::test]
    async fn test_empty_dataset_fails_job() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("ZZZZ", "dummy_ok", None)
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);

        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("no market data available for ZZZZ"));
        // progress stays where the running job left it
        assert_eq!(job.progress, PROGRESS_CLAIMED);
        assert!(executor.manager().get_result(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_analyzer_fails_job() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_market_data()
            .withf(|symbol, period| {
                symbol.eq_ignore_ascii_case("AAPL") && period.eq_ignore_ascii_case("1y")
            })
            .times(1)
            .returning(|symbol, _| MarketDataset::from_closes(symbol, &closes(60)));
        let executor = executor_with(Arc::new(provider), ExecutorConfig::default());

        let id = executor
            .manager()
            .create_job("AAPL", "not_registered", None)
            .await
            .unwrap();
        assert!(!executor.execute_job(id).await);

        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("analyzer 'not_registered' not found")
        );
    }

    #[tokio::test]
    async fn test_validation_errors_fail_job() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("MSFT", "dummy_ok", None)
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);
        let job = job(&executor, id).await;
        assert!(job.error_message.unwrap().contains("not enough data points: 5 < 10"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("AAPL", "panicky", None)
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);
        let job = job(&executor, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("analyzer 'panicky' panicked: index out of range")
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let provider = StaticMarketData::new().with_closes("AAPL", &closes(60));
        let executor = executor_with(
            Arc::new(provider),
            ExecutorConfig::default().with_analyzer_timeout(Duration::from_millis(50)),
        );
        let id = executor
            .manager()
            .create_job("AAPL", "slow", None)
            .await
            .unwrap();

        assert!(!executor.execute_job(id).await);
        let job = job(&executor, id).await;
        assert_eq!(
            job.error_message.as_deref(),
            Some("analysis timed out after 0.05s")
        );
    }

    #[tokio::test]
    async fn test_non_pending_jobs_are_untouched() {
        let executor = executor();
        assert!(!executor.execute_job(JobId(999)).await);

        let id = executor
            .manager()
            .create_job("AAPL", "dummy_ok", None)
            .await
            .unwrap();
        executor.manager().cancel_job(id).await.unwrap();
        let before = job(&executor, id).await;

        assert!(!executor.execute_job(id).await);
        assert_eq!(job(&executor, id).await, before);
    }

    #[tokio::test]
    async fn test_concurrent_execution_claims_once() {
        let executor = executor();
        let id = executor
            .manager()
            .create_job("AAPL", "dummy_ok", None)
            .await
            .unwrap();

        let (a, b) = tokio::join!(executor.execute_job(id), executor.execute_job(id));
        assert!(a ^ b, "exactly one execution must win");
        assert_eq!(job(&executor, id).await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_batch_execution() {
        let executor = executor();
        let manager = executor.manager().clone();
        manager.create_job("AAPL", "dummy_ok", None).await.unwrap();
        manager.create_job("AAPL", "dummy_ok", None).await.unwrap();
        manager.create_job("ZZZZ", "dummy_ok", None).await.unwrap();

        let summary = executor.execute_all_pending(10).await;
        assert_eq!(
            summary,
            BatchSummary {
                completed: 2,
                failed: 1,
                total: 3
            }
        );
        assert_eq!(executor.execute_all_pending(10).await.total, 0);
    }

    #[tokio::test]
    async fn test_concurrent_batch_execution() {
        let executor = executor();
        for _ in 0..6 {
            executor
                .manager()
                .create_job("AAPL", "dummy_ok", None)
                .await
                .unwrap();
        }

        let summary = executor.execute_pending_concurrently(4, 3).await;
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 4);

        let counts = executor.manager().job_counts().await.unwrap();
        assert_eq!(counts.get(JobStatus::Completed), 4);
        assert_eq!(counts.get(JobStatus::Pending), 2);
    }

    #[tokio::test]
    async fn test_execute_for_symbol() {
        let executor = executor();
        let outcomes = executor
            .execute_for_symbol("AAPL", &["dummy_ok".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert!(outcomes["dummy_ok"].is_success());
        match &outcomes["missing"] {
            SymbolRunOutcome::Failed { error, .. } => {
                assert_eq!(error, "analyzer 'missing' not found");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_ne!(outcomes["dummy_ok"].job_id(), outcomes["missing"].job_id());
    }

    #[tokio::test]
    async fn test_auto_select() {
        let executor = executor();
        assert!(executor.auto_select("ZZZZ").await.is_none());

        // Registered names are dummy_ok, panicky and slow: no rule matches them
        let report = executor.auto_select("aapl").await.unwrap();
        assert!(report.selections.is_empty());
        assert!(report.volatility > 0.0);
    }
}
