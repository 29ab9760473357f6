//! Yahoo Finance market data provider

use crate::cache::{CacheKey, CacheTiers};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use finproof_core::{Bar, MarketDataProvider, MarketDataset, TickerInfo};
use serde_json::json;
use std::future::Future;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

/// History periods accepted by [`period_start`]
pub const SUPPORTED_PERIODS: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

/// Start of the window a period string covers, ending at `end`
pub fn period_start(period: &str, end: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let days = match period {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 30,
        "3mo" => 90,
        "6mo" => 180,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1825,
        "10y" => 3650,
        "max" => 36_500, // ~100 years
        "ytd" => {
            return chrono::NaiveDate::from_ymd_opt(end.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .ok_or_else(|| MarketError::InvalidRange(period.to_string()));
        }
        _ => return Err(MarketError::InvalidRange(period.to_string())),
    };
    Ok(end - chrono::Duration::days(days))
}

/// Price history and ticker metadata from Yahoo Finance
///
/// Responses are cached per symbol and period. Empty answers are not cached so
/// a transient outage does not hide data for a full TTL.
#[derive(Clone)]
pub struct YahooMarketData {
    config: MarketConfig,
    caches: CacheTiers,
}

impl YahooMarketData {
    pub fn new(config: MarketConfig) -> Self {
        let caches = CacheTiers::from_config(&config);
        Self { config, caches }
    }

    /// Cache handles, for inspection and manual invalidation
    pub fn caches(&self) -> &CacheTiers {
        &self.caches
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.config.request_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| MarketError::Timeout(limit))?
    }

    async fn fetch_history(&self, symbol: &str, period: &str) -> Result<MarketDataset> {
        let end = Utc::now();
        let start = period_start(period, end)?;

        let provider =
            yahoo::YahooConnector::new().map_err(|e| MarketError::Yahoo(e.to_string()))?;

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| MarketError::Yahoo(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| MarketError::Yahoo(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| MarketError::Yahoo(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| MarketError::Yahoo(e.to_string()))?;

        let bars = quotes
            .iter()
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp as i64, 0).map(|timestamp| Bar {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();

        Ok(MarketDataset::new(symbol, bars))
    }

    async fn fetch_ticker_info(&self, symbol: &str) -> Result<TickerInfo> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| MarketError::Yahoo(e.to_string()))?;

        let response = provider
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| MarketError::Yahoo(e.to_string()))?;

        let quote = response
            .last_quote()
            .map_err(|e| MarketError::Yahoo(e.to_string()))?;

        // The chart endpoint carries no company profile; keep what it has
        let mut info = TickerInfo::new(symbol);
        info.extra.insert("last_close".to_string(), json!(quote.close));
        info.extra.insert("last_volume".to_string(), json!(quote.volume));
        if let Some(ts) = DateTime::from_timestamp(quote.timestamp as i64, 0) {
            info.extra.insert("as_of".to_string(), json!(ts.to_rfc3339()));
        }
        Ok(info)
    }

    async fn load_history(&self, symbol: &str, period: &str) -> MarketDataset {
        match self.with_timeout(self.fetch_history(symbol, period)).await {
            Ok(dataset) => {
                tracing::debug!(symbol = %symbol, period = %period, bars = dataset.len(), "Fetched history");
                dataset
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, period = %period, error = %e, "Failed to fetch history");
                MarketDataset::empty(symbol)
            }
        }
    }

    async fn load_ticker_info(&self, symbol: &str) -> TickerInfo {
        match self.with_timeout(self.fetch_ticker_info(symbol)).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Failed to fetch ticker info");
                TickerInfo::new(symbol)
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooMarketData {
    async fn get_market_data(&self, symbol: &str, period: &str) -> MarketDataset {
        let symbol = symbol.trim().to_uppercase();
        let key = CacheKey::new(&symbol, "history", period);
        self.caches
            .market_data
            .get_or_fetch(key, |ds| !ds.is_empty(), || self.load_history(&symbol, period))
            .await
    }

    async fn get_ticker_info(&self, symbol: &str) -> TickerInfo {
        let symbol = symbol.trim().to_uppercase();
        let key = CacheKey::new(&symbol, "info", "");
        self.caches
            .ticker_info
            .get_or_fetch(key, |info| !info.extra.is_empty(), || {
                self.load_ticker_info(&symbol)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_start() {
        let end = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(
            period_start("1y", end).unwrap(),
            end - chrono::Duration::days(365)
        );
        assert_eq!(
            period_start("ytd", end).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        for period in SUPPORTED_PERIODS {
            assert!(period_start(period, end).is_ok(), "{period}");
        }
    }

    #[test]
    fn test_invalid_period() {
        let err = period_start("3w", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::InvalidRange(ref p) if p == "3w"));
    }

    #[tokio::test]
    async fn test_invalid_period_yields_empty_dataset() {
        let provider = YahooMarketData::new(MarketConfig::default());
        let dataset = provider.get_market_data("aapl", "3w").await;
        assert!(dataset.is_empty());
        assert_eq!(dataset.symbol, "AAPL");
        assert!(provider.caches().market_data.is_empty().await);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_market_data() {
        let provider = YahooMarketData::new(MarketConfig::default());
        let dataset = provider.get_market_data("AAPL", "1mo").await;
        assert!(!dataset.is_empty());
        assert_eq!(provider.caches().market_data.len().await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_ticker_info() {
        let provider = YahooMarketData::new(MarketConfig::default());
        let info = provider.get_ticker_info("AAPL").await;
        assert!(info.extra.contains_key("last_close"));
    }
}
