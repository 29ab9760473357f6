//! Analysis result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Direction of a signal or overall recommendation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "hold" => Ok(Self::Hold),
            other => Err(crate::Error::Generic(format!("unknown signal type '{other}'"))),
        }
    }
}

/// A single indicator-level signal embedded in a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    /// Originating indicator, e.g. "RSI"
    pub indicator: String,
    pub description: String,
    pub confidence: f64,
}

impl Signal {
    pub fn new(
        signal_type: SignalType,
        indicator: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            signal_type,
            indicator: indicator.into(),
            description: description.into(),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Whether an analyzer produced a full result or degraded gracefully
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    #[default]
    Complete,
    /// The analyzer hit an expected failure; `summary` explains it
    Degraded,
}

/// Structured output of one analyzer invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_type: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// Always within 0.0..=1.0
    pub confidence: f64,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub recommendation: SignalType,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub outcome: ResultOutcome,
}

impl AnalysisResult {
    pub fn new(
        analysis_type: impl Into<String>,
        symbol: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            analysis_type: analysis_type.into(),
            symbol: symbol.into(),
            timestamp: Utc::now(),
            summary: summary.into(),
            confidence: 0.0,
            data: BTreeMap::new(),
            predictions: None,
            signals: Vec::new(),
            recommendation: SignalType::Hold,
            warnings: Vec::new(),
            outcome: ResultOutcome::Complete,
        }
    }

    /// The "empty" result an analyzer returns instead of failing
    pub fn degraded(
        analysis_type: impl Into<String>,
        symbol: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let mut result = Self::new(analysis_type, symbol, reason.clone());
        result.outcome = ResultOutcome::Degraded;
        result.warnings.push(reason);
        result
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_prediction(mut self, key: impl Into<String>, value: Value) -> Self {
        self.predictions
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals.extend(signals);
        self
    }

    pub fn with_recommendation(mut self, recommendation: SignalType) -> Self {
        self.recommendation = recommendation;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.add_warning(warning);
        self
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_degraded(&self) -> bool {
        self.outcome == ResultOutcome::Degraded
    }

    /// Number of buy and sell signals
    pub fn signal_counts(&self) -> (usize, usize) {
        count_directions(&self.signals)
    }

    /// One-line description for listings
    pub fn headline(&self) -> String {
        format!(
            "{} {} - {} ({:.0}% confidence, {})",
            self.symbol,
            self.analysis_type,
            self.recommendation,
            self.confidence * 100.0,
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Overall recommendation from a set of signals
///
/// A side wins only when it leads the other by more than one signal.
pub fn recommendation_from_signals(signals: &[Signal]) -> SignalType {
    let (buys, sells) = count_directions(signals);
    if buys > sells + 1 {
        SignalType::Buy
    } else if sells > buys + 1 {
        SignalType::Sell
    } else {
        SignalType::Hold
    }
}

fn count_directions(signals: &[Signal]) -> (usize, usize) {
    signals.iter().fold((0, 0), |(b, s), sig| match sig.signal_type {
        SignalType::Buy => (b + 1, s),
        SignalType::Sell => (b, s + 1),
        SignalType::Hold => (b, s),
    })
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
