//! Parameters handed to an analyzer invocation
//!
//! [`ResolvedParams`] is the checked key-value view produced by
//! [`ParameterSchema::resolve`](crate::ParameterSchema::resolve). It supports
//! both untyped JSON access and typed accessors for the common value kinds.

use crate::dataset::MarketDataset;
use crate::descriptor::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema-checked custom parameters
///
/// # Example
///
/// ```
/// use finproof_core::ResolvedParams;
///
/// let mut params = ResolvedParams::new();
/// params.insert("window", serde_json::json!(20));
///
/// assert_eq!(params.get_i64("window"), Some(20));
/// assert_eq!(params.i64_or("missing", 5), 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedParams {
    values: BTreeMap<String, Value>,
}

impl ResolvedParams {
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Typed Accessors ===========

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn i64_or(&self, key: &str, fallback: i64) -> i64 {
        self.get_i64(key).unwrap_or(fallback)
    }

    pub fn f64_or(&self, key: &str, fallback: f64) -> f64 {
        self.get_f64(key).unwrap_or(fallback)
    }

    pub fn bool_or(&self, key: &str, fallback: bool) -> bool {
        self.get_bool(key).unwrap_or(fallback)
    }

    /// Positive integer parameter as `usize`, falling back when absent or negative
    pub fn usize_or(&self, key: &str, fallback: usize) -> usize {
        self.get_i64(key)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(fallback)
    }

    // =========== Generic Key-Value Operations ===========

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object view, used when echoing parameters into result data
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }
}

/// Everything an analyzer receives for one run
#[derive(Debug, Clone)]
pub struct AnalysisParameters {
    pub symbol: String,
    pub dataset: MarketDataset,
    pub timeframe: Timeframe,
    pub custom: ResolvedParams,
}

impl AnalysisParameters {
    pub fn new(symbol: impl Into<String>, dataset: MarketDataset) -> Self {
        Self {
            symbol: symbol.into(),
            dataset,
            timeframe: Timeframe::default(),
            custom: ResolvedParams::new(),
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_custom(mut self, custom: ResolvedParams) -> Self {
        self.custom = custom;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_operations() {
        let mut params = ResolvedParams::new();
        assert!(params.is_empty());

        params.insert("key", json!("value"));
        assert_eq!(params.len(), 1);
        assert!(params.contains_key("key"));
        assert_eq!(params.get_str("key"), Some("value"));
        assert_eq!(params.get_i64("key"), None);
    }

    #[test]
    fn test_fallbacks() {
        let mut params = ResolvedParams::new();
        params.insert("window", json!(-3));
        params.insert("flag", json!(false));

        assert_eq!(params.usize_or("window", 20), 20);
        assert_eq!(params.f64_or("ratio", 0.5), 0.5);
        assert!(!params.bool_or("flag", true));
    }

    #[test]
    fn test_to_value() {
        let mut params = ResolvedParams::new();
        params.insert("a", json!(1));
        assert_eq!(params.to_value(), json!({"a": 1}));
    }

    #[test]
    fn test_parameters_builder() {
        let params = AnalysisParameters::new("AAPL", MarketDataset::empty("AAPL"))
            .with_timeframe(Timeframe::Long);
        assert_eq!(params.timeframe, Timeframe::Long);
        assert!(params.custom.is_empty());
    }
}
