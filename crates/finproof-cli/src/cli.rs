//! Command-line definitions

use clap::{Args, Parser, Subcommand};
use finproof_core::Timeframe;
use finproof_jobs::{JobId, JobStatus};
use finproof_utils::LogFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "finproof")]
#[command(about = "Queue and run financial analysis jobs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// JSON config file; FINPROOF_* environment variables are used otherwise
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Job store file, overriding the configured one
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Keep jobs in memory for this invocation only
    #[arg(long, global = true, conflicts_with = "store")]
    pub in_memory: bool,

    /// Log output format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Queue analysis jobs for a symbol
    Submit(JobSpec),

    /// Execute pending jobs
    Run {
        /// Maximum number of jobs to execute
        #[arg(short, long)]
        max: Option<usize>,

        /// Jobs in flight at once; 1 runs sequentially
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Execute one pending job
    RunJob {
        id: JobId,
    },

    /// Queue and immediately run analyses for a symbol
    Analyze(JobSpec),

    /// List jobs, newest first
    List {
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        status: Option<JobStatus>,

        /// Analysis type
        #[arg(long = "type")]
        analysis_type: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show a job and its result
    Show {
        id: JobId,
    },

    /// Cancel a pending job
    Cancel {
        id: JobId,
    },

    /// Delete a job and its result
    Delete {
        id: JobId,
    },

    /// Queue a failed or cancelled job again
    Retry {
        id: JobId,
    },

    /// Job counts per status
    Stats,

    /// Delete old completed, failed and cancelled jobs
    Cleanup {
        /// Completed jobs to keep
        #[arg(long)]
        keep_completed: Option<usize>,

        /// Failed and cancelled jobs to keep
        #[arg(long)]
        keep_failed: Option<usize>,
    },

    /// List registered analyzers by category
    Analyzers,

    /// Suggest analyzers for a symbol from its recent prices
    Select {
        symbol: String,
    },
}

/// What to analyze
#[derive(Args, Debug, Clone)]
pub struct JobSpec {
    /// Ticker symbol
    pub symbol: String,

    /// Analysis types, comma separated
    #[arg(short = 't', long = "types", value_delimiter = ',', required_unless_present = "auto")]
    pub analysis_types: Vec<String>,

    /// Pick analysis types from market conditions
    #[arg(long)]
    pub auto: bool,

    #[arg(long)]
    pub timeframe: Option<Timeframe>,

    /// Extra analyzer parameters as a JSON object
    #[arg(short, long)]
    pub params: Option<String>,
}
