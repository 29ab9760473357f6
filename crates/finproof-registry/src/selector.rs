//! Heuristic analyzer selection
//!
//! Maps two dataset statistics, annualized volatility and the relative move
//! over a fixed lookback, onto a set of analyzers worth running. Every pick
//! carries a human readable reason so front ends can explain it.

use finproof_core::MarketDataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Analyzer picked for high volatility
pub const MONTE_CARLO: &str = "monte_carlo";
/// Analyzer picked for a strong trend
pub const TREND_FORECAST: &str = "trend_forecast";
/// Analyzer picked for sideways movement
pub const MEAN_REVERSION: &str = "mean_reversion";
/// Analyzer picked unconditionally
pub const SENTIMENT: &str = "sentiment";

/// Cut-offs used by [`AutoSelector`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectorThresholds {
    /// Annualized volatility above which simulation is selected
    pub high_volatility: f64,
    /// Absolute trend above which trend forecasting is selected
    pub strong_trend: f64,
    /// Absolute trend below which the series counts as sideways
    pub sideways: f64,
    /// Bars spanned by the trend measurement
    pub trend_lookback: usize,
}

impl Default for SelectorThresholds {
    fn default() -> Self {
        Self {
            high_volatility: 0.30,
            strong_trend: 0.10,
            sideways: 0.05,
            trend_lookback: 20,
        }
    }
}

/// One selected analyzer and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    pub reason: String,
}

/// Outcome of a selection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub volatility: f64,
    pub trend: f64,
    pub selections: Vec<Selection>,
}

impl SelectionReport {
    /// Selected analyzer names in rule order
    pub fn names(&self) -> Vec<String> {
        self.selections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selections.iter().any(|s| s.name == name)
    }
}

/// Rule-based analyzer selector
#[derive(Debug, Clone, Default)]
pub struct AutoSelector {
    thresholds: SelectorThresholds,
}

impl AutoSelector {
    /// Selector with the default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: SelectorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SelectorThresholds {
        &self.thresholds
    }

    /// Pick analyzers for `dataset` among `available` names
    ///
    /// Rules are independent; names missing from `available` are dropped.
    pub fn select(&self, dataset: &MarketDataset, available: &BTreeSet<String>) -> SelectionReport {
        let t = &self.thresholds;
        let volatility = dataset.annualized_volatility();
        let trend = dataset.trend(t.trend_lookback).unwrap_or(0.0);

        let mut candidates = Vec::new();
        if volatility > t.high_volatility {
            candidates.push((
                MONTE_CARLO,
                format!("high volatility ({:.1}%)", volatility * 100.0),
            ));
        }
        if trend.abs() > t.strong_trend {
            candidates.push((
                TREND_FORECAST,
                format!(
                    "strong trend ({:+.1}% over {} bars)",
                    trend * 100.0,
                    t.trend_lookback
                ),
            ));
        }
        if trend.abs() < t.sideways {
            candidates.push((MEAN_REVERSION, "sideways movement detected".to_string()));
        }
        candidates.push((SENTIMENT, "always relevant for current market mood".to_string()));

        let selections: Vec<Selection> = candidates
            .into_iter()
            .filter(|(name, _)| available.contains(*name))
            .map(|(name, reason)| Selection {
                name: name.to_string(),
                reason,
            })
            .collect();

        tracing::debug!(
            symbol = %dataset.symbol,
            volatility,
            trend,
            selected = selections.len(),
            "Auto-selection complete"
        );

        SelectionReport {
            volatility,
            trend,
            selections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_names() -> BTreeSet<String> {
        [MONTE_CARLO, TREND_FORECAST, MEAN_REVERSION, SENTIMENT, "technical"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn linear(n: usize, start: f64, step: f64) -> MarketDataset {
        let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        MarketDataset::from_closes("TEST", &closes)
    }

    #[test]
    fn test_flat_series_is_sideways() {
        let ds = MarketDataset::from_closes("TEST", &[100.0; 40]);
        let report = AutoSelector::new().select(&ds, &all_names());
        assert_eq!(report.volatility, 0.0);
        assert_eq!(report.trend, 0.0);
        assert_eq!(report.names(), vec![MEAN_REVERSION, SENTIMENT]);
    }

    #[test]
    fn test_strong_uptrend() {
        // 101 -> 120 over the last 20 bars, tiny volatility
        let ds = linear(40, 81.0, 1.0);
        let report = AutoSelector::new().select(&ds, &all_names());
        assert!(report.trend > 0.10);
        assert!(report.volatility < 0.30);
        assert_eq!(report.names(), vec![TREND_FORECAST, SENTIMENT]);
        assert!(report.selections[0].reason.starts_with("strong trend (+"));
    }

    #[test]
    fn test_high_volatility() {
        let closes: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 106.0 })
            .collect();
        let ds = MarketDataset::from_closes("TEST", &closes);
        let report = AutoSelector::new().select(&ds, &all_names());
        assert!(report.contains(MONTE_CARLO));
        assert!(report.selections[0].reason.starts_with("high volatility"));
    }

    #[test]
    fn test_moderate_trend_selects_neither_trend_rule() {
        // 7% move sits between the sideways and strong-trend cut-offs
        let ds = linear(20, 100.0, 7.0 / 19.0);
        let report = AutoSelector::new().select(&ds, &all_names());
        assert!((report.trend - 0.07).abs() < 1e-9);
        assert_eq!(report.names(), vec![SENTIMENT]);
    }

    #[test]
    fn test_short_dataset_has_zero_trend() {
        let ds = linear(10, 100.0, 5.0);
        let report = AutoSelector::new().select(&ds, &all_names());
        assert_eq!(report.trend, 0.0);
        assert!(report.contains(MEAN_REVERSION));

        let single = MarketDataset::from_closes("TEST", &[100.0]);
        assert_eq!(AutoSelector::new().select(&single, &all_names()).volatility, 0.0);
    }

    #[test]
    fn test_unavailable_names_are_dropped() {
        let available: BTreeSet<String> = ["technical".to_string()].into_iter().collect();
        let ds = MarketDataset::from_closes("TEST", &[100.0; 40]);
        let report = AutoSelector::new().select(&ds, &available);
        assert!(report.selections.is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = SelectorThresholds {
            sideways: 0.0,
            strong_trend: 0.01,
            ..SelectorThresholds::default()
        };
        let ds = linear(20, 100.0, 0.1);
        let report = AutoSelector::with_thresholds(thresholds).select(&ds, &all_names());
        assert_eq!(report.names(), vec![TREND_FORECAST, SENTIMENT]);
    }
}
