//! Log-linear trend forecasting
//!
//! Fits `ln(close) = a + b * t` over a trailing window and extrapolates the
//! drift over the horizon implied by the job's timeframe (7, 30 or 90
//! business days), with a prediction band at the requested confidence level.

use crate::stats::{self, LinearFit};
use async_trait::async_trait;
use finproof_core::{
    AnalysisCategory, AnalysisParameters, AnalysisResult, Analyzer, AnalyzerDescriptor, ParamSpec,
    ProgressReporter, Signal, SignalType,
};
use serde_json::json;

/// Registry key
pub const NAME: &str = "trend_forecast";

/// Forecast move, in percent, needed for a directional call
const DIRECTION_THRESHOLD_PCT: f64 = 5.0;

/// Trend extrapolation analyzer
pub struct TrendForecastAnalyzer {
    descriptor: AnalyzerDescriptor,
}

impl Default for TrendForecastAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendForecastAnalyzer {
    pub fn new() -> Self {
        let descriptor =
            AnalyzerDescriptor::new(NAME, "Trend Forecast", AnalysisCategory::Statistical)
                .with_description("Projects the recent log-price drift with a prediction band")
                .with_min_data_points(60)
                .with_estimated_duration(10)
                .with_parameter(
                    ParamSpec::number("confidence_interval", 0.95)
                        .range(0.8, 0.99)
                        .describe("Width of the prediction band"),
                )
                .with_parameter(
                    ParamSpec::integer("fit_window", 120)
                        .range(30.0, 1000.0)
                        .describe("Trailing bars used for the fit"),
                );
        Self { descriptor }
    }
}

#[async_trait]
impl Analyzer for TrendForecastAnalyzer {
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
        progress.report(10);

        let window = params.custom.usize_or("fit_window", 120);
        let level = params.custom.f64_or("confidence_interval", 0.95);
        let recent = params.dataset.tail(window);
        let closes = recent.closes();
        let n = closes.len();

        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = closes.iter().map(|c| c.ln()).collect();
        let Some(fit) = stats::ols(&x, &y) else {
            return AnalysisResult::degraded(NAME, symbol, "trend model could not be fitted");
        };
        progress.report(40);

        let horizon = params.timeframe.horizon_days();
        let z = stats::z_for_confidence(level);
        let (forecast, lower, upper) = project(&fit, n, horizon, z);
        progress.report(70);

        let current = closes[n - 1];
        let target = forecast[horizon - 1];
        let change_pct = (target - current) / current * 100.0;

        let (trend, recommendation) = if change_pct > DIRECTION_THRESHOLD_PCT {
            ("bullish", SignalType::Buy)
        } else if change_pct < -DIRECTION_THRESHOLD_PCT {
            ("bearish", SignalType::Sell)
        } else {
            ("neutral", SignalType::Hold)
        };

        let spread = (upper[horizon - 1] - lower[horizon - 1]) / current;
        let confidence = (1.0 - spread).clamp(0.3, 0.9);

        let last_timestamp = recent.bars()[n - 1].timestamp;
        let dates = stats::business_days_after(last_timestamp, horizon);
        // Daily drift annualized from the log slope
        let annual_drift = (fit.slope * finproof_core::TRADING_DAYS_PER_YEAR).exp() - 1.0;

        let summary = format!(
            "Log-linear forecast: {trend} trend expected. Target {target:.2} ({change_pct:+.1}%) in {horizon} business days."
        );

        let mut result = AnalysisResult::new(NAME, symbol, summary)
            .with_confidence(confidence)
            .with_recommendation(recommendation)
            .with_data("current_price", json!(current))
            .with_data("forecast_end", json!(target))
            .with_data("change_percent", json!(change_pct))
            .with_data("daily_log_drift", json!(fit.slope))
            .with_data("annualized_drift", json!(annual_drift))
            .with_data("r_squared", json!(fit.r_squared))
            .with_data("fit_window", json!(n))
            .with_data("forecast_days", json!(horizon))
            .with_data("timeframe", json!(params.timeframe.as_str()))
            .with_data("confidence_interval", json!(level))
            .with_prediction("forecast", json!(forecast))
            .with_prediction("lower_bound", json!(lower))
            .with_prediction("upper_bound", json!(upper))
            .with_prediction("dates", json!(dates))
            .with_signals(vec![Signal::new(
                recommendation,
                "Trend Forecast",
                format!("Forecast: {trend} trend, target {target:.2}"),
                confidence,
            )]);

        if fit.r_squared < 0.3 {
            result.add_warning(format!(
                "weak trend fit (r-squared {:.2}); forecast is mostly noise",
                fit.r_squared
            ));
        }

        progress.report(100);
        result
    }
}

/// Price path and band for `horizon` steps past the last of `n` fitted points
fn project(fit: &LinearFit, n: usize, horizon: usize, z: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut forecast = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    for h in 1..=horizon {
        let x = (n - 1 + h) as f64;
        let mean = fit.predict(x);
        let band = z * fit.prediction_std(x);
        forecast.push(mean.exp());
        lower.push((mean - band).exp());
        upper.push((mean + band).exp());
    }
    (forecast, lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_core::{MarketDataset, NoopProgress, Timeframe};

    fn growth(n: usize, daily: f64) -> MarketDataset {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * (1.0 + daily).powi(i as i32)).collect();
        MarketDataset::from_closes("TEST", &closes)
    }

    #[tokio::test]
    async fn test_exponential_growth_is_bullish() {
        let params =
            AnalysisParameters::new("TEST", growth(120, 0.005)).with_timeframe(Timeframe::Medium);
        let result = TrendForecastAnalyzer::new()
            .analyze(&params, &NoopProgress)
            .await;

        assert!(!result.is_degraded());
        assert_eq!(result.recommendation, SignalType::Buy);
        // Perfect fit: near-zero band, confidence capped
        assert!((result.confidence - 0.9).abs() < 1e-9);

        let change = result.data["change_percent"].as_f64().unwrap();
        let expected = (1.005_f64.powi(30) - 1.0) * 100.0;
        assert!((change - expected).abs() < 1e-6);

        let predictions = result.predictions.as_ref().unwrap();
        assert_eq!(predictions["forecast"].as_array().unwrap().len(), 30);
        assert_eq!(predictions["dates"].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_horizon_follows_timeframe() {
        for (timeframe, days) in [(Timeframe::Short, 7), (Timeframe::Long, 90)] {
            let params = AnalysisParameters::new("TEST", growth(80, -0.001)).with_timeframe(timeframe);
            let result = TrendForecastAnalyzer::new()
                .analyze(&params, &NoopProgress)
                .await;
            assert_eq!(result.data["forecast_days"], json!(days));
        }
    }

    #[tokio::test]
    async fn test_flat_series_is_neutral() {
        let dataset = MarketDataset::from_closes("TEST", &[50.0; 90]);
        let result = TrendForecastAnalyzer::new()
            .analyze(&AnalysisParameters::new("TEST", dataset), &NoopProgress)
            .await;
        assert_eq!(result.recommendation, SignalType::Hold);
        assert!(result.data["change_percent"].as_f64().unwrap().abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_too_few_points() {
        let result = TrendForecastAnalyzer::new()
            .analyze(&AnalysisParameters::new("TEST", growth(30, 0.01)), &NoopProgress)
            .await;
        assert!(result.is_degraded());
        assert!(result.summary.contains("30 < 60"));
    }
}
