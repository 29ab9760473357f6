//! Error types for market data operations

use thiserror::Error;

/// Market data errors
///
/// These stay inside the providers; the public provider traits degrade to
/// empty values instead of returning them.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    Yahoo(String),

    /// Finnhub API error
    #[error("Finnhub error: {0}")]
    Finnhub(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported history period
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Convert MarketError to finproof_core::Error
impl From<MarketError> for finproof_core::Error {
    fn from(err: MarketError) -> Self {
        finproof_core::Error::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::InvalidRange("3w".to_string());
        assert_eq!(err.to_string(), "Invalid range: 3w");

        let err = MarketError::Config("rate limit must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: rate limit must be positive"
        );
    }

    #[test]
    fn test_error_conversion() {
        let core: finproof_core::Error = MarketError::Yahoo("no data".to_string()).into();
        match core {
            finproof_core::Error::Generic(msg) => assert!(msg.contains("Yahoo Finance")),
            other => panic!("Expected Generic variant, got {other:?}"),
        }
    }
}
