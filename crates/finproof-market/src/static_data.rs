//! In-memory market data

use async_trait::async_trait;
use finproof_core::{MarketDataProvider, MarketDataset, TickerInfo};
use std::collections::HashMap;

/// Provider serving fixed datasets, ignoring the requested period
///
/// Unknown symbols yield an empty dataset, as a remote provider would.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    datasets: HashMap<String, MarketDataset>,
    info: HashMap<String, TickerInfo>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset keyed by its uppercase symbol
    pub fn with_dataset(mut self, dataset: MarketDataset) -> Self {
        self.datasets
            .insert(dataset.symbol.trim().to_uppercase(), dataset);
        self
    }

    /// Add a dataset built from closing prices
    pub fn with_closes(self, symbol: &str, closes: &[f64]) -> Self {
        self.with_dataset(MarketDataset::from_closes(symbol.trim().to_uppercase(), closes))
    }

    pub fn with_ticker_info(mut self, info: TickerInfo) -> Self {
        self.info.insert(info.symbol.trim().to_uppercase(), info);
        self
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.datasets.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn get_market_data(&self, symbol: &str, _period: &str) -> MarketDataset {
        let symbol = symbol.trim().to_uppercase();
        self.datasets
            .get(&symbol)
            .cloned()
            .unwrap_or_else(|| MarketDataset::empty(symbol))
    }

    async fn get_ticker_info(&self, symbol: &str) -> TickerInfo {
        let symbol = symbol.trim().to_uppercase();
        self.info
            .get(&symbol)
            .cloned()
            .unwrap_or_else(|| TickerInfo::new(symbol))
    }
}
