//! Mean reversion analysis
//!
//! Measures how far the last close sits from its rolling mean in standard
//! deviations and estimates the half-life of deviations from an
//! Ornstein-Uhlenbeck style regression of price changes on lagged prices.

use crate::stats;
use async_trait::async_trait;
use finproof_core::dataset::{mean, sample_std};
use finproof_core::{
    AnalysisCategory, AnalysisParameters, AnalysisResult, Analyzer, AnalyzerDescriptor, ParamSpec,
    ProgressReporter, Signal, SignalType,
};
use serde_json::{Value, json};
use std::f64::consts::LN_2;

/// Registry key
pub const NAME: &str = "mean_reversion";

/// Bars used for the half-life regression
const REGRESSION_BARS: usize = 250;

/// Rolling z-score analyzer
pub struct MeanReversionAnalyzer {
    descriptor: AnalyzerDescriptor,
}

impl Default for MeanReversionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeanReversionAnalyzer {
    pub fn new() -> Self {
        let descriptor =
            AnalyzerDescriptor::new(NAME, "Mean Reversion", AnalysisCategory::Statistical)
                .with_description(
                    "Z-score of the price against its rolling mean with a half-life estimate",
                )
                .with_min_data_points(30)
                .with_estimated_duration(5)
                .with_parameter(
                    ParamSpec::integer("window", 20)
                        .range(5.0, 200.0)
                        .describe("Rolling window for mean and deviation"),
                )
                .with_parameter(
                    ParamSpec::number("entry_z", 2.0)
                        .range(0.5, 4.0)
                        .describe("Z-score magnitude that triggers a signal"),
                );
        Self { descriptor }
    }
}

/// Half-life in bars of deviations from the mean, if prices mean-revert
///
/// Regresses `p[t] - p[t-1]` on `p[t-1]`; a negative slope `b` gives a
/// half-life of `-ln 2 / b`.
fn half_life(closes: &[f64]) -> Option<(f64, f64)> {
    let lagged = &closes[..closes.len().saturating_sub(1)];
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let fit = stats::ols(lagged, &deltas)?;
    (fit.slope < 0.0).then(|| (-LN_2 / fit.slope, fit.slope))
}

#[async_trait]
impl Analyzer for MeanReversionAnalyzer {
    fn descriptor(&self) -> &AnalyzerDescriptor {
        &self.descriptor
    }

    async fn analyze(
        &self,
        params: &AnalysisParameters,
        progress: &dyn ProgressReporter,
    ) -> AnalysisResult {
        let symbol = &params.symbol;
        if let Some(first) = self.validate(&params.dataset).into_iter().next() {
            return AnalysisResult::degraded(NAME, symbol, first);
        }

        let window = params.custom.usize_or("window", 20);
        let entry_z = params.custom.f64_or("entry_z", 2.0);
        let closes = params.dataset.closes();
        if closes.len() < window {
            return AnalysisResult::degraded(
                NAME,
                symbol,
                format!("window of {window} bars exceeds the {} available", closes.len()),
            );
        }
        progress.report(20);

        let recent = &closes[closes.len() - window..];
        let rolling_mean = mean(recent);
        let rolling_std = sample_std(recent);
        let current = closes[closes.len() - 1];
        let z = if rolling_std > 0.0 {
            (current - rolling_mean) / rolling_std
        } else {
            0.0
        };
        progress.report(50);

        let regression = &closes[closes.len().saturating_sub(REGRESSION_BARS)..];
        let reversion = half_life(regression);
        progress.report(70);

        let (recommendation, description) = if z <= -entry_z {
            (
                SignalType::Buy,
                format!("Price {:.2} standard deviations below its {window}-bar mean", -z),
            )
        } else if z >= entry_z {
            (
                SignalType::Sell,
                format!("Price {z:.2} standard deviations above its {window}-bar mean"),
            )
        } else {
            (
                SignalType::Hold,
                format!("Price within {entry_z:.1} standard deviations of its {window}-bar mean"),
            )
        };

        let mut confidence = if recommendation == SignalType::Hold {
            0.4
        } else {
            (0.5 + 0.1 * (z.abs() - entry_z)).clamp(0.5, 0.8)
        };
        if reversion.is_none() {
            confidence -= 0.15;
        }

        // Expected path back towards the mean over the horizon
        let horizon = params.timeframe.horizon_days();
        let path: Vec<f64> = (1..=horizon)
            .map(|h| match reversion {
                Some((hl, _)) => {
                    rolling_mean + (current - rolling_mean) * (-LN_2 * h as f64 / hl).exp()
                }
                None => current,
            })
            .collect();
        let last_timestamp = params.dataset.bars()[closes.len() - 1].timestamp;
        let dates = stats::business_days_after(last_timestamp, horizon);

        let half_life_text = reversion.map_or_else(
            || "no measurable half-life".to_string(),
            |(hl, _)| format!("half-life {hl:.1} bars"),
        );
        let summary = format!(
            "Z-score {z:+.2} against the {window}-bar mean {rolling_mean:.2}; {half_life_text}."
        );

        let mut result = AnalysisResult::new(NAME, symbol, summary)
            .with_confidence(confidence)
            .with_recommendation(recommendation)
            .with_data("current_price", json!(current))
            .with_data("rolling_mean", json!(rolling_mean))
            .with_data("rolling_std", json!(rolling_std))
            .with_data("z_score", json!(z))
            .with_data("entry_z", json!(entry_z))
            .with_data("window", json!(window))
            .with_data("upper_band", json!(rolling_mean + entry_z * rolling_std))
            .with_data("lower_band", json!(rolling_mean - entry_z * rolling_std))
            .with_data(
                "half_life_bars",
                reversion.map_or(Value::Null, |(hl, _)| json!(hl)),
            )
            .with_data(
                "reversion_speed",
                reversion.map_or(Value::Null, |(_, speed)| json!(speed)),
            )
            .with_prediction("expected_path", json!(path))
            .with_prediction("dates", json!(dates))
            .with_signals(vec![Signal::new(
                recommendation,
                "Z-Score",
                description,
                confidence,
            )]);

        if rolling_std == 0.0 {
            result.add_warning(format!("price has not moved over the last {window} bars"));
        }
        if reversion.is_none() {
            result.add_warning("no mean-reverting behaviour detected; signal is unreliable");
        }

        progress.report(100);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_core::{MarketDataset, NoopProgress};

    /// Alternating 101 / 99 closes followed by `last`
    fn oscillating_then(last: f64) -> MarketDataset {
        let mut closes: Vec<f64> = (0..59)
            .map(|i| if i % 2 == 0 { 101.0 } else { 99.0 })
            .collect();
        closes.push(last);
        MarketDataset::from_closes("TEST", &closes)
    }

    async fn run(dataset: MarketDataset) -> AnalysisResult {
        MeanReversionAnalyzer::new()
            .analyze(&AnalysisParameters::new("TEST", dataset), &NoopProgress)
            .await
    }

    #[tokio::test]
    async fn test_drop_below_band_is_buy() {
        let result = run(oscillating_then(90.0)).await;

        assert!(!result.is_degraded());
        assert_eq!(result.recommendation, SignalType::Buy);
        assert!(result.data["z_score"].as_f64().unwrap() < -2.0);
        assert!(result.data["half_life_bars"].as_f64().unwrap() > 0.0);
        assert!(result.warnings.is_empty());

        // The expected path climbs back towards the mean
        let predictions = result.predictions.unwrap();
        let path = predictions["expected_path"].as_array().unwrap();
        assert_eq!(path.len(), 30);
        assert!(path[29].as_f64().unwrap() > 90.0);
    }

    #[tokio::test]
    async fn test_spike_above_band_is_sell() {
        let result = run(oscillating_then(110.0)).await;
        assert_eq!(result.recommendation, SignalType::Sell);
        assert!(result.confidence >= 0.5);
    }

    #[tokio::test]
    async fn test_trending_series_has_no_half_life() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + f64::from(i)).collect();
        let result = run(MarketDataset::from_closes("TEST", &closes)).await;

        assert_eq!(result.recommendation, SignalType::Hold);
        assert_eq!(result.data["half_life_bars"], Value::Null);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("no mean-reverting behaviour"))
        );
    }

    #[tokio::test]
    async fn test_constant_series_warns() {
        let result = run(MarketDataset::from_closes("TEST", &[42.0; 40])).await;
        assert!(!result.is_degraded());
        assert_eq!(result.data["z_score"], json!(0.0));
        assert!(result.warnings.iter().any(|w| w.contains("has not moved")));
    }

    #[tokio::test]
    async fn test_window_larger_than_dataset_degrades() {
        let custom = MeanReversionAnalyzer::new()
            .descriptor()
            .parameters
            .resolve(Some(&json!({"window": 100})))
            .unwrap();
        let params = AnalysisParameters::new("TEST", oscillating_then(100.0)).with_custom(custom);
        let result = MeanReversionAnalyzer::new()
            .analyze(&params, &NoopProgress)
            .await;
        assert!(result.is_degraded());
        assert!(result.summary.contains("exceeds"));
    }

    #[test]
    fn test_half_life_of_alternating_prices() {
        // deltas are exactly -2 * (p - 100): b = -2
        let closes: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 101.0 } else { 99.0 }).collect();
        let (hl, speed) = half_life(&closes).unwrap();
        assert!((speed + 2.0).abs() < 1e-9);
        assert!((hl - LN_2 / 2.0).abs() < 1e-9);
    }
}
