//! Static analyzer metadata

use crate::schema::{ParamSpec, ParameterSchema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category an analyzer is grouped under for discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisCategory {
    /// Indicator-driven chart analysis
    Technical,
    /// Statistical time-series models
    Statistical,
    /// Path simulation and risk
    Simulation,
    /// Trained models
    MachineLearning,
    /// Text and sentiment
    Nlp,
    /// Fundamentals and research
    Research,
}

impl AnalysisCategory {
    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Technical => "Technical",
            Self::Statistical => "Statistical",
            Self::Simulation => "Simulation",
            Self::MachineLearning => "Machine Learning",
            Self::Nlp => "NLP",
            Self::Research => "Research",
        }
    }
}

impl fmt::Display for AnalysisCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Analysis horizon requested by a job
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Short,
    #[default]
    Medium,
    Long,
}

impl Timeframe {
    /// Parameter key jobs use to request a timeframe
    pub const PARAM_KEY: &'static str = "timeframe";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Forecast horizon in trading days
    pub fn horizon_days(&self) -> usize {
        match self {
            Self::Short => 7,
            Self::Medium => 30,
            Self::Long => 90,
        }
    }

    pub fn all() -> Vec<Timeframe> {
        vec![Self::Short, Self::Medium, Self::Long]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(Error::invalid_parameter(
                Self::PARAM_KEY,
                format!("unknown timeframe '{other}', expected short, medium or long"),
            )),
        }
    }
}

/// Static metadata describing an analyzer
///
/// Descriptors are immutable once an analyzer is registered. They carry
/// everything the registry, the executor and front ends need to know about an
/// analyzer without running it.
///
/// # Example
///
/// ```
/// use finproof_core::{AnalysisCategory, AnalyzerDescriptor, ParamSpec, Timeframe};
///
/// let descriptor = AnalyzerDescriptor::new("monte_carlo", "Monte Carlo", AnalysisCategory::Simulation)
///     .with_min_data_points(60)
///     .with_timeframes(vec![Timeframe::Medium, Timeframe::Long])
///     .with_parameter(ParamSpec::integer("simulations", 1000).range(100.0, 10_000.0));
///
/// assert!(descriptor.supports(Timeframe::Long));
/// assert!(!descriptor.supports(Timeframe::Short));
/// assert_eq!(descriptor.parameters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDescriptor {
    /// Unique registry key
    pub name: String,
    pub display_name: String,
    pub category: AnalysisCategory,
    pub description: String,
    /// Minimum number of bars the analyzer accepts
    pub min_data_points: usize,
    pub supported_timeframes: Vec<Timeframe>,
    pub estimated_duration_secs: u32,
    pub parameters: ParameterSchema,
}

impl AnalyzerDescriptor {
    /// Create a descriptor with permissive defaults
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        category: AnalysisCategory,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            category,
            description: String::new(),
            min_data_points: 1,
            supported_timeframes: Timeframe::all(),
            estimated_duration_secs: 10,
            parameters: ParameterSchema::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_min_data_points(mut self, min: usize) -> Self {
        self.min_data_points = min;
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.supported_timeframes = timeframes;
        self
    }

    pub fn with_estimated_duration(mut self, secs: u32) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    pub fn with_parameter(mut self, spec: ParamSpec) -> Self {
        self.parameters = self.parameters.with(spec);
        self
    }

    /// Whether the analyzer declares support for a timeframe
    pub fn supports(&self, timeframe: Timeframe) -> bool {
        self.supported_timeframes.contains(&timeframe)
    }
}
