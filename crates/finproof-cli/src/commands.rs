//! Command dispatch

use crate::app::{App, job_parameters};
use crate::cli::{Command, JobSpec};
use crate::render;
use anyhow::{Context, bail};
use finproof_jobs::{JobFilter, RetentionPolicy};
use serde::Serialize;
use tracing::info;

/// Execute one command, printing tables or JSON to stdout
pub async fn run(app: &App, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Submit(spec) => {
            let (types, parameters) = prepare(app, &spec).await?;
            let ids = app.submit(&spec.symbol, &types, parameters).await?;
            info!(symbol = %spec.symbol, jobs = ids.len(), "Jobs submitted");
            if json {
                return print_json(&ids);
            }
            for (id, analysis_type) in ids.iter().zip(&types) {
                println!("Queued job {id}: {} {analysis_type}", spec.symbol.to_uppercase());
            }
        }

        Command::Run { max, concurrency } => {
            let max = max.unwrap_or(app.config().default_batch_size);
            let concurrency = concurrency.unwrap_or(app.config().concurrency);
            let summary = if concurrency > 1 {
                app.executor()
                    .execute_pending_concurrently(max, concurrency)
                    .await
            } else {
                app.executor().execute_all_pending(max).await
            };
            if json {
                return print_json(&summary);
            }
            println!("{}", render::batch_line(&summary));
        }

        Command::RunJob { id } => {
            let completed = app.executor().execute_job(id).await;
            let job = app
                .manager()
                .get_job(id)
                .await?
                .with_context(|| format!("job {id} not found"))?;
            let result = app.manager().get_result(id).await?;
            if json {
                return print_json(&serde_json::json!({ "job": job, "result": result }));
            }
            if !completed && !job.status.is_terminal() {
                println!("Job {id} was not executed; it is {}", job.status);
            }
            print!("{}", render::job_detail(&job, result.as_ref()));
        }

        Command::Analyze(spec) => {
            let (types, parameters) = prepare(app, &spec).await?;
            let outcomes = app
                .executor()
                .execute_for_symbol_with(&spec.symbol, &types, parameters)
                .await?;
            if json {
                return print_json(&outcomes);
            }
            println!("{}", render::outcomes_table(&outcomes));
        }

        Command::List {
            symbol,
            status,
            analysis_type,
            limit,
        } => {
            let mut filter = JobFilter::new().limit(limit);
            if let Some(symbol) = symbol {
                filter = filter.symbol(symbol);
            }
            if let Some(status) = status {
                filter = filter.status(status);
            }
            if let Some(analysis_type) = analysis_type {
                filter = filter.analysis_type(analysis_type);
            }
            let jobs = app.manager().list_jobs(&filter).await?;
            if json {
                return print_json(&jobs);
            }
            if jobs.is_empty() {
                println!("No jobs found");
            } else {
                println!("{}", render::jobs_table(&jobs));
            }
        }

        Command::Show { id } => {
            let job = app
                .manager()
                .get_job(id)
                .await?
                .with_context(|| format!("job {id} not found"))?;
            let result = app.manager().get_result(id).await?;
            if json {
                return print_json(&serde_json::json!({ "job": job, "result": result }));
            }
            print!("{}", render::job_detail(&job, result.as_ref()));
        }

        Command::Cancel { id } => {
            if !app.manager().cancel_job(id).await? {
                bail!("job {id} cannot be cancelled; only pending jobs can");
            }
            println!("Cancelled job {id}");
        }

        Command::Delete { id } => {
            if !app.manager().delete_job(id).await? {
                bail!("job {id} not found");
            }
            println!("Deleted job {id}");
        }

        Command::Retry { id } => {
            let new_id = app.manager().retry_job(id).await?;
            if json {
                return print_json(&new_id);
            }
            println!("Queued job {new_id} as a retry of job {id}");
        }

        Command::Stats => {
            let counts = app.manager().job_counts().await?;
            if json {
                return print_json(&counts);
            }
            println!("{}", render::counts_table(&counts));
        }

        Command::Cleanup {
            keep_completed,
            keep_failed,
        } => {
            let defaults = app.retention();
            let policy = RetentionPolicy {
                keep_completed: keep_completed.unwrap_or(defaults.keep_completed),
                keep_failed: keep_failed.unwrap_or(defaults.keep_failed),
            };
            let removed = app.manager().cleanup(policy).await?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("Removed {removed} old job(s)");
        }

        Command::Analyzers => {
            if json {
                let descriptors: Vec<_> =
                    app.registry().list_by_category().into_values().flatten().collect();
                return print_json(&descriptors);
            }
            println!("{}", render::analyzers_table(app.registry()));
        }

        Command::Select { symbol } => {
            let report = app
                .executor()
                .auto_select(&symbol)
                .await
                .with_context(|| format!("no market data available for {symbol}"))?;
            if json {
                return print_json(&report);
            }
            println!("{}", render::selection_table(&symbol.to_uppercase(), &report));
        }
    }
    Ok(())
}

async fn prepare(
    app: &App,
    spec: &JobSpec,
) -> anyhow::Result<(Vec<String>, Option<serde_json::Value>)> {
    let parameters = job_parameters(spec.params.as_deref(), spec.timeframe)?;
    let types = app
        .analysis_types_for(&spec.symbol, &spec.analysis_types, spec.auto)
        .await?;
    Ok((types, parameters))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
