//! Core Analyzer trait definition

use crate::dataset::MarketDataset;
use crate::descriptor::AnalyzerDescriptor;
use crate::params::AnalysisParameters;
use crate::progress::ProgressReporter;
use crate::result::AnalysisResult;
use async_trait::async_trait;

/// Contract every pluggable analysis strategy implements
///
/// `analyze` is total: expected failures (too little data, a model that does
/// not converge, an unreachable news feed) are reported by returning
/// [`AnalysisResult::degraded`] with confidence 0, never by panicking. The
/// executor treats a panic as a programming error and fails the job.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Static metadata, including the parameter schema
    fn descriptor(&self) -> &AnalyzerDescriptor;

    /// Registry key
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Validation errors for `dataset`; empty means acceptable
    fn validate(&self, dataset: &MarketDataset) -> Vec<String> {
        validate_dataset(self.descriptor(), dataset)
    }

    /// Run the analysis
    async fn analyze(
        &self,
        params: &AnalysisParameters,
        progress: &dyn ProgressReporter,
    ) -> AnalysisResult;
}

/// Default dataset checks: minimum bar count and usable close prices
pub fn validate_dataset(descriptor: &AnalyzerDescriptor, dataset: &MarketDataset) -> Vec<String> {
    let mut errors = Vec::new();

    if dataset.len() < descriptor.min_data_points {
        errors.push(format!(
            "not enough data points: {} < {} required by {}",
            dataset.len(),
            descriptor.min_data_points,
            descriptor.name
        ));
    }

    let invalid = dataset
        .bars()
        .iter()
        .filter(|b| !b.close.is_finite() || b.close <= 0.0)
        .count();
    if invalid > 0 {
        errors.push(format!("dataset contains {invalid} bars with invalid close prices"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AnalysisCategory;
    use crate::progress::NoopProgress;

    struct Fixed {
        descriptor: AnalyzerDescriptor,
    }

    #[async_trait]
    impl Analyzer for Fixed {
        fn descriptor(&self) -> &AnalyzerDescriptor {
            &self.descriptor
        }

        async fn analyze(
            &self,
            params: &AnalysisParameters,
            _progress: &dyn ProgressReporter,
        ) -> AnalysisResult {
            let errors = self.validate(&params.dataset);
            if let Some(first) = errors.first() {
                return AnalysisResult::degraded(self.name(), &params.symbol, first.clone());
            }
            AnalysisResult::new(self.name(), &params.symbol, "fine").with_confidence(0.8)
        }
    }

    fn analyzer(min: usize) -> Fixed {
        Fixed {
            descriptor: AnalyzerDescriptor::new("fixed", "Fixed", AnalysisCategory::Statistical)
                .with_min_data_points(min),
        }
    }

    #[test]
    fn test_validate_min_points() {
        let a = analyzer(5);
        let errors = a.validate(&MarketDataset::from_closes("X", &[1.0, 2.0]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("2 < 5"));
        assert!(a.validate(&MarketDataset::from_closes("X", &[1.0; 5])).is_empty());
    }

    #[test]
    fn test_validate_invalid_prices() {
        let a = analyzer(1);
        let errors = a.validate(&MarketDataset::from_closes("X", &[1.0, f64::NAN, -2.0]));
        assert_eq!(errors, vec!["dataset contains 2 bars with invalid close prices"]);
    }

    #[test]
    fn test_analyze_degrades_instead_of_failing() {
        let a = analyzer(10);
        let params = AnalysisParameters::new("AAPL", MarketDataset::from_closes("AAPL", &[1.0]));
        let result = tokio_test::block_on(a.analyze(&params, &NoopProgress));
        assert!(result.is_degraded());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(a.name(), "fixed");
    }
}
