//! Declarative parameter schemas
//!
//! Every analyzer declares the custom parameters it understands as a list of
//! [`ParamSpec`]s. Job parameters arrive as an open JSON object; the schema
//! turns them into [`ResolvedParams`] at the executor boundary so analyzers
//! only ever see checked values.

use crate::params::ResolvedParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Integer,
    Number,
    Boolean,
    /// One of a fixed set of strings
    Choice { options: Vec<String> },
}

/// One declared parameter with its constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    fn new(name: impl Into<String>, kind: ParamKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            min: None,
            max: None,
            description: String::new(),
        }
    }

    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ParamKind::Integer, Value::from(default))
    }

    pub fn number(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ParamKind::Number, Value::from(default))
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParamKind::Boolean, Value::from(default))
    }

    pub fn choice(name: impl Into<String>, options: &[&str], default: &str) -> Self {
        let options = options.iter().map(|o| (*o).to_string()).collect();
        Self::new(name, ParamKind::Choice { options }, Value::from(default))
    }

    /// Inclusive numeric bounds
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check a supplied value against this parameter, returning its normalized form
    pub fn check(&self, value: &Value) -> Result<Value> {
        match &self.kind {
            ParamKind::Integer => {
                let n = value
                    .as_i64()
                    .or_else(|| {
                        value
                            .as_f64()
                            .filter(|f| f.fract() == 0.0 && f.is_finite())
                            .map(|f| f as i64)
                    })
                    .ok_or_else(|| self.type_error("an integer", value))?;
                self.check_bounds(n as f64)?;
                Ok(Value::from(n))
            }
            ParamKind::Number => {
                let n = value
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| self.type_error("a number", value))?;
                self.check_bounds(n)?;
                Ok(Value::from(n))
            }
            ParamKind::Boolean => value
                .as_bool()
                .map(Value::from)
                .ok_or_else(|| self.type_error("a boolean", value)),
            ParamKind::Choice { options } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| self.type_error("a string", value))?
                    .trim()
                    .to_lowercase();
                if options.iter().any(|o| o == &s) {
                    Ok(Value::from(s))
                } else {
                    Err(Error::invalid_parameter(
                        &self.name,
                        format!("'{s}' is not one of [{}]", options.join(", ")),
                    ))
                }
            }
        }
    }

    fn check_bounds(&self, n: f64) -> Result<()> {
        match (self.min, self.max) {
            (Some(min), _) if n < min => Err(Error::invalid_parameter(
                &self.name,
                format!("{n} is below the minimum of {min}"),
            )),
            (_, Some(max)) if n > max => Err(Error::invalid_parameter(
                &self.name,
                format!("{n} is above the maximum of {max}"),
            )),
            _ => Ok(()),
        }
    }

    fn type_error(&self, expected: &str, got: &Value) -> Error {
        Error::invalid_parameter(&self.name, format!("expected {expected}, got {got}"))
    }
}

/// Ordered set of parameter specs declared by an analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    specs: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing an earlier one with the same name
    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        self
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve raw job parameters against the schema
    ///
    /// Unknown keys are ignored, missing or null keys fall back to the
    /// declared default, present keys are type- and range-checked.
    pub fn resolve(&self, raw: Option<&Value>) -> Result<ResolvedParams> {
        let supplied = match raw {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(Error::invalid_parameter(
                    "parameters",
                    format!("expected a JSON object, got {other}"),
                ));
            }
        };

        let mut resolved = ResolvedParams::new();
        for spec in &self.specs {
            let value = match supplied.and_then(|m| m.get(&spec.name)) {
                Some(v) if !v.is_null() => spec.check(v)?,
                _ => spec.default.clone(),
            };
            resolved.insert(spec.name.clone(), value);
        }
        Ok(resolved)
    }
}
