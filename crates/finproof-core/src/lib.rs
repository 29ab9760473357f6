//! Core abstractions for finproof
//!
//! This crate defines the analyzer contract shared by every other crate in the
//! workspace: the [`Analyzer`] trait, the static [`AnalyzerDescriptor`] with its
//! declarative [`ParameterSchema`], the [`MarketDataset`] analyzers consume and
//! the [`AnalysisResult`] they produce.

pub mod analyzer;
pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod params;
pub mod progress;
pub mod provider;
pub mod result;
pub mod schema;

pub use analyzer::{Analyzer, validate_dataset};
pub use dataset::{Bar, MarketDataset, TRADING_DAYS_PER_YEAR};
pub use descriptor::{AnalysisCategory, AnalyzerDescriptor, Timeframe};
pub use error::{Error, Result};
pub use params::{AnalysisParameters, ResolvedParams};
pub use progress::{NoopProgress, ProgressReporter};
pub use provider::{MarketDataProvider, TickerInfo};
pub use result::{AnalysisResult, ResultOutcome, Signal, SignalType, recommendation_from_signals};
pub use schema::{ParamKind, ParamSpec, ParameterSchema};
