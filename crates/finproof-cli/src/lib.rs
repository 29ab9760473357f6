//! Command-line front end for finproof
//!
//! [`App`] wires the job manager, analyzer registry and executor once at
//! startup; [`commands::run`] dispatches a parsed [`Cli`] command against it.

pub mod app;
pub mod cli;
pub mod commands;
pub mod render;

pub use app::{App, StoreMode, job_parameters};
pub use cli::{Cli, Command, JobSpec};
