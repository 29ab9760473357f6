//! Market data collaborator interface

use crate::dataset::MarketDataset;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Descriptive metadata for a ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    /// Provider-specific fields
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl TickerInfo {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }
}

/// Source of price history and ticker metadata
///
/// Implementations must be idempotent and cache-friendly. Failures surface as
/// an empty dataset, never as an error, so callers only need to check
/// [`MarketDataset::is_empty`].
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Price history for `symbol` covering `period` (e.g. "1y", "6mo")
    async fn get_market_data(&self, symbol: &str, period: &str) -> MarketDataset;

    async fn get_ticker_info(&self, symbol: &str) -> TickerInfo;
}
