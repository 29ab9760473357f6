//! Service wiring shared by every command

use anyhow::{Context, bail};
use finproof_core::{MarketDataProvider, Timeframe};
use finproof_jobs::{
    ExecutorConfig, FileJobStore, InMemoryJobStore, JobExecutor, JobId, JobManager, JobStore,
    RetentionPolicy,
};
use finproof_market::{MarketConfig, YahooMarketData};
use finproof_registry::AnalyzerRegistry;
use finproof_utils::AppConfig;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Where jobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// JSON file from the configuration
    File,
    /// Process memory, gone on exit
    Memory,
}

/// The manager, registry and executor built once at startup
pub struct App {
    config: AppConfig,
    manager: Arc<JobManager>,
    registry: Arc<AnalyzerRegistry>,
    executor: JobExecutor,
}

impl App {
    /// Wire the production services: file or memory store, Yahoo prices,
    /// built-in analyzers with Finnhub headlines
    pub async fn open(config: AppConfig, market: MarketConfig, mode: StoreMode) -> anyhow::Result<Self> {
        config.validate()?;
        market.validate()?;

        let store: Arc<dyn JobStore> = match mode {
            StoreMode::File => {
                let path = config.resolved_store_path();
                let store = FileJobStore::open(&path)
                    .await
                    .with_context(|| format!("failed to open job store {}", path.display()))?;
                debug!(path = %path.display(), "Job store opened");
                Arc::new(store)
            }
            StoreMode::Memory => Arc::new(InMemoryJobStore::new()),
        };
        let registry = finproof_analyzers::ensure_initialized(&market)
            .context("failed to register built-in analyzers")?;
        let provider = Arc::new(YahooMarketData::new(market));

        Ok(Self::with_parts(config, store, registry, provider))
    }

    /// Wire explicit collaborators
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn JobStore>,
        registry: Arc<AnalyzerRegistry>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let manager = Arc::new(JobManager::new(store));

        let mut executor_config =
            ExecutorConfig::default().with_data_period(config.data_period.clone());
        if let Some(timeout) = config.analyzer_timeout() {
            executor_config = executor_config.with_analyzer_timeout(timeout);
        }
        let executor = JobExecutor::new(
            Arc::clone(&manager),
            Arc::clone(&registry),
            provider,
            executor_config,
        );

        info!(analyzers = registry.len(), "Application initialized");
        Self {
            config,
            manager,
            registry,
            executor,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &JobExecutor {
        &self.executor
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            keep_completed: self.config.retention_completed,
            keep_failed: self.config.retention_failed,
        }
    }

    /// Reject analysis types the registry does not know
    pub fn check_analysis_types(&self, analysis_types: &[String]) -> anyhow::Result<()> {
        let unknown: Vec<&str> = analysis_types
            .iter()
            .filter(|t| !self.registry.contains(t))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            let available: Vec<String> = self.registry.list_names().into_iter().collect();
            bail!(
                "unknown analysis type(s): {}; available: {}",
                unknown.join(", "),
                available.join(", ")
            );
        }
        Ok(())
    }

    /// Requested analysis types, or the auto-selected ones when `auto` is set
    pub async fn analysis_types_for(
        &self,
        symbol: &str,
        requested: &[String],
        auto: bool,
    ) -> anyhow::Result<Vec<String>> {
        if !auto {
            if requested.is_empty() {
                bail!("no analysis types given");
            }
            self.check_analysis_types(requested)?;
            return Ok(requested.to_vec());
        }

        let Some(report) = self.executor.auto_select(symbol).await else {
            bail!("no market data available for {symbol}");
        };
        let mut types = report.names();
        for requested in requested {
            if !types.contains(requested) {
                types.push(requested.clone());
            }
        }
        self.check_analysis_types(&types)?;
        Ok(types)
    }

    /// Queue one job per analysis type
    pub async fn submit(
        &self,
        symbol: &str,
        analysis_types: &[String],
        parameters: Option<Value>,
    ) -> anyhow::Result<Vec<JobId>> {
        self.check_analysis_types(analysis_types)?;
        let ids = self
            .manager
            .create_jobs(symbol, analysis_types, parameters)
            .await?;
        Ok(ids)
    }
}

/// Build job parameters from a raw JSON object and an optional timeframe
pub fn job_parameters(raw: Option<&str>, timeframe: Option<Timeframe>) -> anyhow::Result<Option<Value>> {
    let mut parameters = match raw {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("invalid --params JSON")? {
            Value::Object(map) => map,
            other => bail!("--params must be a JSON object, got {other}"),
        },
        None => Map::new(),
    };
    if let Some(timeframe) = timeframe {
        parameters.insert(
            Timeframe::PARAM_KEY.to_string(),
            Value::from(timeframe.as_str()),
        );
    }
    Ok((!parameters.is_empty()).then_some(Value::Object(parameters)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_jobs::JobStatus;
    use finproof_market::{NoHeadlines, StaticMarketData};
    use serde_json::json;

    fn app() -> App {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i % 5) as f64).collect();
        let provider = StaticMarketData::new().with_closes("AAPL", &closes);
        App::with_parts(
            AppConfig::default(),
            Arc::new(InMemoryJobStore::new()),
            Arc::new(finproof_analyzers::builtin_registry_with(Arc::new(NoHeadlines)).unwrap()),
            Arc::new(provider),
        )
    }

    #[test]
    fn test_job_parameters() {
        assert_eq!(job_parameters(None, None).unwrap(), None);
        assert_eq!(
            job_parameters(Some(r#"{"simulations": 500}"#), Some(Timeframe::Short)).unwrap(),
            Some(json!({"simulations": 500, "timeframe": "short"}))
        );
        assert!(job_parameters(Some("[1, 2]"), None).is_err());
        assert!(job_parameters(Some("{oops"), None).is_err());
    }

    #[tokio::test]
    async fn test_submit_validates_types() {
        let app = app();
        let err = app
            .submit("AAPL", &["technical".to_string(), "astrology".to_string()], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("astrology"));
        assert_eq!(app.manager().job_counts().await.unwrap().total(), 0);

        let ids = app
            .submit("aapl", &["technical".to_string(), "monte_carlo".to_string()], None)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        let job = app.manager().get_job(ids[0]).await.unwrap().unwrap();
        assert_eq!(job.symbol, "AAPL");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_auto_selection_always_includes_sentiment() {
        let app = app();
        let types = app.analysis_types_for("AAPL", &[], true).await.unwrap();
        assert!(types.contains(&"sentiment".to_string()));

        let types = app
            .analysis_types_for("AAPL", &["technical".to_string()], true)
            .await
            .unwrap();
        assert!(types.contains(&"technical".to_string()));

        assert!(app.analysis_types_for("ZZZZ", &[], true).await.is_err());
        assert!(app.analysis_types_for("AAPL", &[], false).await.is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let app = app();
        app.submit("AAPL", &["technical".to_string()], None)
            .await
            .unwrap();

        let summary = app.executor().execute_all_pending(10).await;
        assert_eq!(summary.completed, 1);

        let done = app.manager().completed_jobs(10).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(app.manager().get_result(done[0].id).await.unwrap().is_some());
    }

    #[test]
    fn test_retention_from_config() {
        let app = app();
        assert_eq!(app.retention(), RetentionPolicy::default());
    }
}
