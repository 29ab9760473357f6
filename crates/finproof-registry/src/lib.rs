//! Analyzer discovery for finproof
//!
//! This crate provides the [`AnalyzerRegistry`], an immutable name to factory
//! map built once at startup through a [`RegistryBuilder`], and the
//! [`AutoSelector`] that recommends analyzers from dataset statistics.

pub mod registry;
pub mod selector;

pub use registry::{AnalyzerFactory, AnalyzerRegistry, RegistryBuilder};
pub use selector::{AutoSelector, Selection, SelectionReport, SelectorThresholds};
