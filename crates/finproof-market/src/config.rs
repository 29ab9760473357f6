//! Configuration for market data providers

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the Finnhub API key
pub const FINNHUB_API_KEY_ENV: &str = "FINNHUB_API_KEY";

/// Configuration for market data providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Cache TTL for price history
    pub cache_ttl_market_data: Duration,

    /// Cache TTL for ticker metadata
    pub cache_ttl_ticker_info: Duration,

    /// Cache TTL for headlines
    pub cache_ttl_news: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Finnhub API key (optional; headlines are disabled without it)
    pub finnhub_api_key: Option<String>,

    /// Finnhub requests per minute
    pub finnhub_rate_limit: u32,

    /// How far back headline queries reach
    pub news_lookback_days: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cache_ttl_market_data: Duration::from_secs(3600), // 1 hour
            cache_ttl_ticker_info: Duration::from_secs(86_400), // 1 day
            cache_ttl_news: Duration::from_secs(1800),        // 30 minutes
            request_timeout: Duration::from_secs(30),
            finnhub_api_key: None,
            finnhub_rate_limit: 60,
            news_lookback_days: 7,
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Defaults with the Finnhub key taken from the environment
    pub fn from_env() -> Self {
        Self {
            finnhub_api_key: read_api_key(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.finnhub_rate_limit == 0 {
            return Err(MarketError::Config(
                "finnhub_rate_limit must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(MarketError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.news_lookback_days == 0 {
            return Err(MarketError::Config(
                "news_lookback_days must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn read_api_key() -> Option<String> {
    std::env::var(FINNHUB_API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    cache_ttl_market_data: Option<Duration>,
    cache_ttl_ticker_info: Option<Duration>,
    cache_ttl_news: Option<Duration>,
    request_timeout: Option<Duration>,
    finnhub_api_key: Option<String>,
    finnhub_rate_limit: Option<u32>,
    news_lookback_days: Option<u32>,
}

impl MarketConfigBuilder {
    /// Set cache TTL for price history
    pub fn cache_ttl_market_data(mut self, duration: Duration) -> Self {
        self.cache_ttl_market_data = Some(duration);
        self
    }

    /// Set cache TTL for ticker metadata
    pub fn cache_ttl_ticker_info(mut self, duration: Duration) -> Self {
        self.cache_ttl_ticker_info = Some(duration);
        self
    }

    /// Set cache TTL for headlines
    pub fn cache_ttl_news(mut self, duration: Duration) -> Self {
        self.cache_ttl_news = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set Finnhub API key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Load Finnhub API key from environment
    pub fn with_env_api_key(mut self) -> Self {
        if let Some(key) = read_api_key() {
            self.finnhub_api_key = Some(key);
        }
        self
    }

    /// Set Finnhub requests per minute
    pub fn finnhub_rate_limit(mut self, per_minute: u32) -> Self {
        self.finnhub_rate_limit = Some(per_minute);
        self
    }

    pub fn news_lookback_days(mut self, days: u32) -> Self {
        self.news_lookback_days = Some(days);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            cache_ttl_market_data: self
                .cache_ttl_market_data
                .unwrap_or(defaults.cache_ttl_market_data),
            cache_ttl_ticker_info: self
                .cache_ttl_ticker_info
                .unwrap_or(defaults.cache_ttl_ticker_info),
            cache_ttl_news: self.cache_ttl_news.unwrap_or(defaults.cache_ttl_news),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            finnhub_api_key: self.finnhub_api_key,
            finnhub_rate_limit: self.finnhub_rate_limit.unwrap_or(defaults.finnhub_rate_limit),
            news_lookback_days: self.news_lookback_days.unwrap_or(defaults.news_lookback_days),
        };

        config.validate()?;
        Ok(config)
    }
}
