//! Shared utilities for finproof
//!
//! This crate provides common functionality used across the finproof workspace:
//! tracing setup and the application configuration.

pub mod config;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
