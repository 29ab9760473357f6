//! Market data collaborators for finproof
//!
//! Concrete implementations of the [`MarketDataProvider`] contract plus the
//! [`HeadlineSource`] used by text-based analyzers:
//!
//! - [`YahooMarketData`]: price history from Yahoo Finance behind a TTL cache
//! - [`FinnhubHeadlines`]: rate-limited company news from Finnhub
//! - [`StaticMarketData`]: fixed in-memory datasets for tests and offline runs
//!
//! Providers never surface errors to callers. Failures are logged and turned
//! into empty datasets or empty headline lists.
//!
//! [`MarketDataProvider`]: finproof_core::MarketDataProvider

pub mod cache;
pub mod config;
pub mod error;
pub mod news;
pub mod static_data;
pub mod yahoo;

pub use cache::{CacheKey, CacheTiers, MarketCache};
pub use config::{MarketConfig, MarketConfigBuilder};
pub use error::{MarketError, Result};
pub use news::{FinnhubHeadlines, Headline, HeadlineSource, NoHeadlines};
pub use static_data::StaticMarketData;
pub use yahoo::{YahooMarketData, period_start};
