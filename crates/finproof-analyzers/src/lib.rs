//! Built-in analyzers for finproof
//!
//! | Name | Category | Approach |
//! |------|----------|----------|
//! | `technical` | Technical | SMA crossovers, RSI, Bollinger Bands, MACD via `ta` |
//! | `trend_forecast` | Statistical | Log-linear drift projection with prediction band |
//! | `monte_carlo` | Simulation | Geometric Brownian motion paths, VaR |
//! | `mean_reversion` | Statistical | Rolling z-score and half-life |
//! | `sentiment` | NLP | Lexicon scoring of news headlines |
//!
//! [`ensure_initialized`] registers all of them into a process-wide registry
//! exactly once. [`builtin_registry_with`] builds a fresh registry for tests
//! and dependency injection.

pub mod mean_reversion;
pub mod monte_carlo;
pub mod sentiment;
pub mod stats;
pub mod technical;
pub mod trend_forecast;

pub use mean_reversion::MeanReversionAnalyzer;
pub use monte_carlo::MonteCarloAnalyzer;
pub use sentiment::SentimentAnalyzer;
pub use technical::TechnicalAnalyzer;
pub use trend_forecast::TrendForecastAnalyzer;

use finproof_core::Analyzer;
use finproof_market::{FinnhubHeadlines, HeadlineSource, MarketConfig};
use finproof_registry::{AnalyzerRegistry, RegistryBuilder};
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Arc<AnalyzerRegistry>> = OnceLock::new();

/// Add every built-in analyzer to `builder`
pub fn register_builtin_analyzers(
    builder: &mut RegistryBuilder,
    headlines: Arc<dyn HeadlineSource>,
) -> finproof_core::Result<()> {
    builder
        .register(|| Arc::new(TechnicalAnalyzer::new()) as Arc<dyn Analyzer>)?
        .register(|| Arc::new(TrendForecastAnalyzer::new()) as Arc<dyn Analyzer>)?
        .register(|| Arc::new(MonteCarloAnalyzer::new()) as Arc<dyn Analyzer>)?
        .register(|| Arc::new(MeanReversionAnalyzer::new()) as Arc<dyn Analyzer>)?
        .register(move || Arc::new(SentimentAnalyzer::new(headlines.clone())) as Arc<dyn Analyzer>)?;
    Ok(())
}

/// Registry of `builder`'s analyzers plus every built-in
///
/// Fails if a built-in name is already taken; no partial registry is returned.
pub fn builtin_registry_extending(
    mut builder: RegistryBuilder,
    headlines: Arc<dyn HeadlineSource>,
) -> finproof_core::Result<AnalyzerRegistry> {
    register_builtin_analyzers(&mut builder, headlines)?;
    Ok(builder.build())
}

/// Fresh registry of built-ins using the given headline source
pub fn builtin_registry_with(
    headlines: Arc<dyn HeadlineSource>,
) -> finproof_core::Result<AnalyzerRegistry> {
    builtin_registry_extending(AnalyzerRegistry::builder(), headlines)
}

/// Fresh registry of built-ins with Finnhub headlines from `config`
pub fn builtin_registry(config: &MarketConfig) -> finproof_core::Result<AnalyzerRegistry> {
    builtin_registry_with(Arc::new(FinnhubHeadlines::new(config)))
}

/// Process-wide registry of built-ins, created on first successful call
///
/// Later calls return the same registry and ignore `config`.
pub fn ensure_initialized(config: &MarketConfig) -> finproof_core::Result<Arc<AnalyzerRegistry>> {
    if let Some(registry) = REGISTRY.get() {
        return Ok(registry.clone());
    }
    let registry = Arc::new(builtin_registry(config)?);
    Ok(REGISTRY.get_or_init(|| registry).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_core::AnalysisCategory;
    use finproof_market::NoHeadlines;
    use finproof_registry::selector;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry_with(Arc::new(NoHeadlines)).unwrap();
        assert_eq!(registry.len(), 5);

        let names: Vec<String> = registry.list_names().into_iter().collect();
        assert_eq!(
            names,
            vec![
                "mean_reversion",
                "monte_carlo",
                "sentiment",
                "technical",
                "trend_forecast"
            ]
        );

        let by_category = registry.list_by_category();
        assert_eq!(by_category[&AnalysisCategory::Statistical].len(), 2);
        assert_eq!(by_category[&AnalysisCategory::Nlp][0].name, "sentiment");
    }

    #[test]
    fn test_selector_names_are_registered() {
        let registry = builtin_registry_with(Arc::new(NoHeadlines)).unwrap();
        for name in [
            selector::MONTE_CARLO,
            selector::TREND_FORECAST,
            selector::MEAN_REVERSION,
            selector::SENTIMENT,
        ] {
            assert!(registry.contains(name), "{name} not registered");
        }
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut builder = AnalyzerRegistry::builder();
        register_builtin_analyzers(&mut builder, Arc::new(NoHeadlines)).unwrap();
        let err = register_builtin_analyzers(&mut builder, Arc::new(NoHeadlines)).unwrap_err();
        assert!(matches!(err, finproof_core::Error::DuplicateAnalyzer(ref n) if n == "technical"));
        assert_eq!(builder.len(), 5);
    }

    #[test]
    fn test_name_clash_fails_the_whole_build() {
        let mut builder = AnalyzerRegistry::builder();
        builder
            .register(|| Arc::new(TechnicalAnalyzer::new()) as Arc<dyn Analyzer>)
            .unwrap();

        let err = builtin_registry_extending(builder, Arc::new(NoHeadlines)).unwrap_err();
        assert!(matches!(err, finproof_core::Error::DuplicateAnalyzer(ref n) if n == "technical"));
    }

    #[test]
    fn test_ensure_initialized_is_shared() {
        let config = MarketConfig::default();
        let a = ensure_initialized(&config).unwrap();
        let b = ensure_initialized(&config).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_descriptors_resolve_their_own_defaults() {
        let registry = builtin_registry_with(Arc::new(NoHeadlines)).unwrap();
        for name in registry.list_names() {
            let descriptor = registry.descriptor(&name).unwrap();
            let resolved = descriptor.parameters.resolve(None).unwrap();
            assert_eq!(resolved.len(), descriptor.parameters.len(), "{name}");
        }
    }
}
