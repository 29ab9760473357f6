//! Tabular OHLCV price history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading days used to annualize daily statistics
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Bar whose open, high, low and close are all `price`
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }
    }
}

/// Price history for one symbol, ordered oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDataset {
    pub symbol: String,
    bars: Vec<Bar>,
}

impl MarketDataset {
    /// Create a dataset; bars are sorted by timestamp
    pub fn new(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    /// Build a dataset of daily flat bars from closing prices, ending now
    pub fn from_closes(symbol: impl Into<String>, closes: &[f64]) -> Self {
        let end = Utc::now();
        let n = closes.len() as i64;
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::flat(end - chrono::Duration::days(n - i as i64), c))
            .collect();
        Self::new(symbol, bars)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Last `n` bars
    pub fn tail(&self, n: usize) -> MarketDataset {
        let start = self.bars.len().saturating_sub(n);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }

    /// Simple bar-to-bar returns, skipping non-positive bases
    pub fn returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .filter(|w| w[0].close > 0.0)
            .map(|w| (w[1].close - w[0].close) / w[0].close)
            .collect()
    }

    /// Log returns, skipping non-positive prices
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .filter(|w| w[0].close > 0.0 && w[1].close > 0.0)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// Annualized volatility: sample standard deviation of daily returns
    /// scaled by sqrt(252). Zero when fewer than two returns exist.
    pub fn annualized_volatility(&self) -> f64 {
        sample_std(&self.returns()) * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Relative move across the last `lookback` bars,
    /// `(close[n-1] - close[n-lookback]) / close[n-lookback]`
    pub fn trend(&self, lookback: usize) -> Option<f64> {
        let n = self.bars.len();
        if lookback < 2 || n < lookback {
            return None;
        }
        let base = self.bars[n - lookback].close;
        let last = self.bars[n - 1].close;
        (base > 0.0).then(|| (last - base) / base)
    }
}

/// Arithmetic mean, zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), zero for fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
