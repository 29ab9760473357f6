//! Headline sources for text-based analysis

use crate::cache::{CacheKey, MarketCache};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";

/// A news item about a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

impl Headline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            source: String::new(),
            published_at: None,
            url: String::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Title and summary joined for scoring
    pub fn text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.summary)
        }
    }
}

/// Source of recent headlines
///
/// Like market data providers, failures surface as an empty list.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Most recent headlines for `symbol`, newest first, at most `limit`
    async fn headlines(&self, symbol: &str, limit: usize) -> Vec<Headline>;
}

/// Source that never has headlines
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeadlines;

#[async_trait]
impl HeadlineSource for NoHeadlines {
    async fn headlines(&self, _symbol: &str, _limit: usize) -> Vec<Headline> {
        Vec::new()
    }
}

/// Finnhub company news article
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FinnhubNewsArticle {
    #[serde(default)]
    datetime: i64,
    headline: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    url: String,
}

impl From<FinnhubNewsArticle> for Headline {
    fn from(article: FinnhubNewsArticle) -> Self {
        Self {
            title: article.headline,
            summary: article.summary,
            source: article.source,
            published_at: DateTime::from_timestamp(article.datetime, 0),
            url: article.url,
        }
    }
}

/// Company news from Finnhub with rate limiting and a TTL cache
pub struct FinnhubHeadlines {
    client: Client,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
    lookback_days: i64,
    cache: MarketCache<Vec<Headline>>,
}

impl FinnhubHeadlines {
    /// Create a headline source from the market configuration
    ///
    /// Without an API key every query returns no headlines.
    pub fn new(config: &MarketConfig) -> Self {
        let per_minute = NonZeroU32::new(config.finnhub_rate_limit).unwrap_or(NonZeroU32::MIN);
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.finnhub_api_key.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            lookback_days: i64::from(config.news_lookback_days),
            cache: MarketCache::new(config.cache_ttl_news),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_company_news(&self, api_key: &str, symbol: &str) -> Result<Vec<Headline>> {
        self.rate_limiter.until_ready().await;

        let to = Utc::now().date_naive();
        let from = to - chrono::Duration::days(self.lookback_days);
        let url = format!(
            "{FINNHUB_BASE_URL}/company-news?symbol={symbol}&from={from}&to={to}&token={api_key}"
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketError::Finnhub(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Finnhub(format!("API error {status}: {body}")));
        }

        let articles = response.json::<Vec<FinnhubNewsArticle>>().await?;
        let mut headlines: Vec<Headline> = articles.into_iter().map(Headline::from).collect();
        headlines.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(headlines)
    }

    async fn load(&self, api_key: &str, symbol: &str) -> Vec<Headline> {
        match self.fetch_company_news(api_key, symbol).await {
            Ok(headlines) => {
                tracing::debug!(symbol = %symbol, count = headlines.len(), "Fetched headlines");
                headlines
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Failed to fetch headlines");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HeadlineSource for FinnhubHeadlines {
    async fn headlines(&self, symbol: &str, limit: usize) -> Vec<Headline> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(symbol = %symbol, "Finnhub API key not configured, skipping headlines");
            return Vec::new();
        };

        let symbol = symbol.trim().to_uppercase();
        let key = CacheKey::new(&symbol, "company-news", self.lookback_days.to_string());
        let mut headlines = self
            .cache
            .get_or_fetch(key, |h| !h.is_empty(), || self.load(api_key, &symbol))
            .await;
        headlines.truncate(limit);
        headlines
    }
}
