//! Monte Carlo price simulation
//!
//! Simulates geometric Brownian motion paths calibrated on historical log
//! returns and reports the distribution of outcomes at the horizon implied by
//! the timeframe: percentile bands, probability of profit, value at risk and
//! expected shortfall.

use crate::stats;
use async_trait::async_trait;
use finproof_core::dataset::{mean, sample_std};
use finproof_core::{
    AnalysisCategory, AnalysisParameters, AnalysisResult, Analyzer, AnalyzerDescriptor, ParamSpec,
    ProgressReporter, Signal, SignalType, Timeframe,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::f64::consts::PI;

/// Registry key
pub const NAME: &str = "monte_carlo";

/// Simulations between cooperative yields
const CHUNK: usize = 100;

/// Geometric Brownian motion simulator
pub struct MonteCarloAnalyzer {
    descriptor: AnalyzerDescriptor,
}

impl Default for MonteCarloAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard normal draw (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl MonteCarloAnalyzer {
    pub fn new() -> Self {
        let descriptor =
            AnalyzerDescriptor::new(NAME, "Monte Carlo Simulation", AnalysisCategory::Simulation)
                .with_description("Simulates price paths to estimate outcome ranges and risk")
                .with_min_data_points(60)
                .with_timeframes(vec![Timeframe::Medium, Timeframe::Long])
                .with_estimated_duration(20)
                .with_parameter(
                    ParamSpec::integer("simulations", 1000)
                        .range(100.0, 10_000.0)
                        .describe("Number of simulated paths"),
                )
                .with_parameter(
                    ParamSpec::number("confidence_interval", 0.95)
                        .range(0.8, 0.99)
                        .describe("Confidence level for bands and value at risk"),
                )
                .with_parameter(
                    ParamSpec::integer("seed", 0)
                        .range(0.0, 4_294_967_295.0)
                        .describe("Random seed; 0 draws a fresh one"),
                );
        Self { descriptor }
    }
}

#[async_trait]
impl Analyzer for MonteCarloAnalyzer {
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

        let simulations = params.custom.usize_or("simulations", 1000).max(1);
        let level = params.custom.f64_or("confidence_interval", 0.95);
        let seed = match params.custom.get_i64("seed") {
            Some(s) if s > 0 => s as u64,
            _ => rand::random(),
        };
        let horizon = params.timeframe.horizon_days();

        let log_returns = params.dataset.log_returns();
        let mu = mean(&log_returns);
        let sigma = sample_std(&log_returns);
        let Some(current) = params.dataset.last_close() else {
            return AnalysisResult::degraded(NAME, symbol, "dataset has no closing price");
        };
        progress.report(10);

        let mut rng = StdRng::seed_from_u64(seed);
        // by_day[h] holds every path's price after h + 1 days
        let mut by_day: Vec<Vec<f64>> = vec![Vec::with_capacity(simulations); horizon];
        for sim in 0..simulations {
            let mut price = current;
            for day in &mut by_day {
                price *= (mu + sigma * standard_normal(&mut rng)).exp();
                day.push(price);
            }
            if (sim + 1) % CHUNK == 0 {
                progress.report((10 + 70 * (sim + 1) / simulations) as u8);
                tokio::task::yield_now().await;
            }
        }
        progress.report(80);

        let lower_q = (1.0 - level) / 2.0;
        let upper_q = 1.0 - lower_q;
        let mut median_path = Vec::with_capacity(horizon);
        let mut lower_path = Vec::with_capacity(horizon);
        let mut upper_path = Vec::with_capacity(horizon);
        for day in &mut by_day {
            day.sort_by(f64::total_cmp);
            median_path.push(stats::quantile(day, 0.5));
            lower_path.push(stats::quantile(day, lower_q));
            upper_path.push(stats::quantile(day, upper_q));
        }

        let finals = &by_day[horizon - 1];
        let n = finals.len() as f64;
        let prob_profit = finals.iter().filter(|p| **p > current).count() as f64 / n;
        let expected_price = finals.iter().sum::<f64>() / n;
        let expected_return = expected_price / current - 1.0;

        // Value at risk and expected shortfall as positive loss fractions
        let var_price = stats::quantile(finals, 1.0 - level);
        let value_at_risk = (current - var_price) / current;
        let tail: Vec<f64> = finals.iter().copied().filter(|p| *p <= var_price).collect();
        let expected_shortfall = if tail.is_empty() {
            value_at_risk
        } else {
            (current - mean(&tail)) / current
        };

        let recommendation = if prob_profit > 0.6 && expected_return > 0.02 {
            SignalType::Buy
        } else if prob_profit < 0.4 && expected_return < -0.02 {
            SignalType::Sell
        } else {
            SignalType::Hold
        };
        let confidence = (0.4 + (prob_profit - 0.5).abs()).clamp(0.3, 0.85);

        let annual_vol = sigma * finproof_core::TRADING_DAYS_PER_YEAR.sqrt();
        let summary = format!(
            "{simulations} simulated paths over {horizon} days: median {:.2} ({:+.1}%), {:.0}% chance of profit, {:.0}% VaR {:.1}%.",
            median_path[horizon - 1],
            (median_path[horizon - 1] / current - 1.0) * 100.0,
            prob_profit * 100.0,
            level * 100.0,
            value_at_risk * 100.0,
        );

        let mut result = AnalysisResult::new(NAME, symbol, summary)
            .with_confidence(confidence)
            .with_recommendation(recommendation)
            .with_data("current_price", json!(current))
            .with_data("simulations", json!(simulations))
            .with_data("horizon_days", json!(horizon))
            .with_data("seed", json!(seed))
            .with_data("daily_drift", json!(mu))
            .with_data("daily_volatility", json!(sigma))
            .with_data("annualized_volatility", json!(annual_vol))
            .with_data("median_final_price", json!(median_path[horizon - 1]))
            .with_data("expected_price", json!(expected_price))
            .with_data("expected_return", json!(expected_return))
            .with_data("probability_of_profit", json!(prob_profit))
            .with_data("value_at_risk", json!(value_at_risk))
            .with_data("expected_shortfall", json!(expected_shortfall))
            .with_data("confidence_interval", json!(level))
            .with_prediction("median", json!(median_path))
            .with_prediction("lower_bound", json!(lower_path))
            .with_prediction("upper_bound", json!(upper_path))
            .with_signals(vec![Signal::new(
                recommendation,
                "Monte Carlo",
                format!("{:.0}% of paths end above the current price", prob_profit * 100.0),
                confidence,
            )]);

        if simulations < 500 {
            result.add_warning(format!(
                "only {simulations} simulations; percentiles are noisy"
            ));
        }

        progress.report(100);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_core::{MarketDataset, NoopProgress};

    fn noisy(n: usize) -> MarketDataset {
        // deterministic zig-zag with a slight upward drift
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + i as f64 * 0.1 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        MarketDataset::from_closes("TEST", &closes)
    }

    fn params(dataset: MarketDataset, raw: serde_json::Value) -> AnalysisParameters {
        let custom = MonteCarloAnalyzer::new()
            .descriptor()
            .parameters
            .resolve(Some(&raw))
            .unwrap();
        AnalysisParameters::new("TEST", dataset).with_custom(custom)
    }

    #[tokio::test]
    async fn test_seeded_runs_are_reproducible() {
        let analyzer = MonteCarloAnalyzer::new();
        let p = params(noisy(100), json!({"simulations": 200, "seed": 42}));

        let a = analyzer.analyze(&p, &NoopProgress).await;
        let b = analyzer.analyze(&p, &NoopProgress).await;

        assert_eq!(a.data, b.data);
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.data["seed"], json!(42));
        assert_eq!(a.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_deterministic_growth_is_profitable() {
        // zero volatility: every path compounds the same drift
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let dataset = MarketDataset::from_closes("TEST", &closes);
        let result = MonteCarloAnalyzer::new()
            .analyze(&params(dataset, json!({"seed": 7})), &NoopProgress)
            .await;

        assert_eq!(result.data["probability_of_profit"], json!(1.0));
        assert_eq!(result.recommendation, SignalType::Buy);
        assert!((result.confidence - 0.85).abs() < 1e-12);
        assert!(result.data["value_at_risk"].as_f64().unwrap() < 0.0);
    }

    #[tokio::test]
    async fn test_bands_are_ordered() {
        let result = MonteCarloAnalyzer::new()
            .analyze(&params(noisy(100), json!({"seed": 3})), &NoopProgress)
            .await;
        let predictions = result.predictions.unwrap();
        let lower = predictions["lower_bound"].as_array().unwrap();
        let median = predictions["median"].as_array().unwrap();
        let upper = predictions["upper_bound"].as_array().unwrap();
        assert_eq!(median.len(), 30);
        for i in 0..30 {
            let (l, m, u) = (
                lower[i].as_f64().unwrap(),
                median[i].as_f64().unwrap(),
                upper[i].as_f64().unwrap(),
            );
            assert!(l <= m && m <= u);
        }
    }

    #[tokio::test]
    async fn test_progress_reported() {
        use std::sync::Mutex;
        let seen = Mutex::new(Vec::new());
        let reporter = |p: u8| seen.lock().unwrap().push(p);
        MonteCarloAnalyzer::new()
            .analyze(&params(noisy(100), json!({"seed": 1})), &reporter)
            .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&10));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
