//! Error types for finproof-core

use thiserror::Error;

/// Result type alias for finproof-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for analyzer, registry and parameter operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// A custom parameter failed schema validation
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Two analyzers were registered under the same name
    #[error("Analyzer '{0}' is already registered")]
    DuplicateAnalyzer(String),

    /// No analyzer is registered under the requested name
    #[error("Analyzer '{0}' not found")]
    AnalyzerNotFound(String),

    /// Dataset is unusable for the requested operation
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_parameter("simulations", "must be <= 10000");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'simulations': must be <= 10000"
        );

        let err = Error::AnalyzerNotFound("not_registered".to_string());
        assert_eq!(err.to_string(), "Analyzer 'not_registered' not found");
    }
}
