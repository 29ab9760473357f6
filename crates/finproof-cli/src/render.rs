//! Table and text output

use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use finproof_core::{AnalysisResult, SignalType};
use finproof_jobs::{BatchSummary, Job, JobCounts, JobStatus, SymbolRunOutcome};
use finproof_registry::{AnalyzerRegistry, SelectionReport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn status_cell(status: JobStatus) -> Cell {
    let color = match status {
        JobStatus::Pending => Color::Yellow,
        JobStatus::Running => Color::Cyan,
        JobStatus::Completed => Color::Green,
        JobStatus::Failed => Color::Red,
        JobStatus::Cancelled => Color::DarkGrey,
    };
    Cell::new(status).fg(color)
}

fn signal_cell(signal: SignalType) -> Cell {
    let color = match signal {
        SignalType::Buy => Color::Green,
        SignalType::Sell => Color::Red,
        SignalType::Hold => Color::Yellow,
    };
    Cell::new(signal).fg(color)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

pub fn jobs_table(jobs: &[Job]) -> Table {
    let mut t = table(&["ID", "Symbol", "Analysis", "Status", "Progress", "Created", "Error"]);
    for job in jobs {
        t.add_row(vec![
            Cell::new(job.id),
            Cell::new(&job.symbol),
            Cell::new(&job.analysis_type),
            status_cell(job.status),
            Cell::new(format!("{}%", job.progress)),
            Cell::new(timestamp(job.created_at)),
            Cell::new(job.error_message.as_deref().unwrap_or("")),
        ]);
    }
    t
}

pub fn counts_table(counts: &JobCounts) -> Table {
    let mut t = table(&["Status", "Jobs"]);
    for (status, count) in counts.iter() {
        t.add_row(vec![status_cell(status), Cell::new(count)]);
    }
    t.add_row(vec![Cell::new("total"), Cell::new(counts.total())]);
    t
}

pub fn analyzers_table(registry: &AnalyzerRegistry) -> Table {
    let mut t = table(&[
        "Category",
        "Name",
        "Description",
        "Min bars",
        "Timeframes",
        "Est.",
        "Parameters",
    ]);
    for (category, descriptors) in registry.list_by_category() {
        for d in descriptors {
            let timeframes: Vec<&str> = d.supported_timeframes.iter().map(|tf| tf.as_str()).collect();
            let parameters: Vec<String> = d
                .parameters
                .specs()
                .iter()
                .map(|p| format!("{}={}", p.name, p.default))
                .collect();
            t.add_row(vec![
                Cell::new(category),
                Cell::new(&d.name),
                Cell::new(&d.description),
                Cell::new(d.min_data_points),
                Cell::new(timeframes.join(", ")),
                Cell::new(format!("~{}s", d.estimated_duration_secs)),
                Cell::new(parameters.join("\n")),
            ]);
        }
    }
    t
}

pub fn selection_table(symbol: &str, report: &SelectionReport) -> String {
    let mut t = table(&["Analyzer", "Reason"]);
    for selection in &report.selections {
        t.add_row(vec![&selection.name, &selection.reason]);
    }
    format!(
        "{symbol}: annualized volatility {}, trend {:+.1}%\n{t}",
        percent(report.volatility),
        report.trend * 100.0
    )
}

pub fn outcomes_table(outcomes: &BTreeMap<String, SymbolRunOutcome>) -> Table {
    let mut t = table(&["Analysis", "Job", "Outcome", "Confidence", "Summary"]);
    for (analysis_type, outcome) in outcomes {
        let row = match outcome {
            SymbolRunOutcome::Succeeded {
                job_id,
                summary,
                confidence,
            } => vec![
                Cell::new(analysis_type),
                Cell::new(job_id),
                Cell::new("ok").fg(Color::Green),
                Cell::new(percent(*confidence)),
                Cell::new(summary),
            ],
            SymbolRunOutcome::Failed { job_id, error } => vec![
                Cell::new(analysis_type),
                Cell::new(job_id),
                Cell::new("failed").fg(Color::Red),
                Cell::new("-"),
                Cell::new(error),
            ],
        };
        t.add_row(row);
    }
    t
}

pub fn batch_line(summary: &BatchSummary) -> String {
    format!(
        "Executed {} job(s): {} completed, {} failed",
        summary.total, summary.completed, summary.failed
    )
}

/// Multi-section description of a job and its result
pub fn job_detail(job: &Job, result: Option<&AnalysisResult>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job {} {} {}", job.id, job.symbol, job.analysis_type);
    let _ = writeln!(out, "  status:    {} ({}%)", job.status, job.progress);
    let _ = writeln!(out, "  created:   {}", timestamp(job.created_at));
    if let Some(at) = job.started_at {
        let _ = writeln!(out, "  started:   {}", timestamp(at));
    }
    if let Some(at) = job.completed_at {
        let _ = writeln!(out, "  finished:  {}", timestamp(at));
    }
    if let Some(duration) = job.duration() {
        let _ = writeln!(out, "  duration:  {:.1}s", duration.num_milliseconds() as f64 / 1000.0);
    }
    if !job.parameters.is_empty() {
        let _ = writeln!(out, "  params:    {}", Value::Object(job.parameters.clone()));
    }
    if let Some(error) = &job.error_message {
        let _ = writeln!(out, "  error:     {error}");
    }

    if let Some(result) = result {
        out.push('\n');
        out.push_str(&result_detail(result));
    }
    out
}

fn result_detail(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.summary);
    let _ = writeln!(
        out,
        "Recommendation: {} ({} confidence){}",
        result.recommendation,
        percent(result.confidence),
        if result.is_degraded() { " [degraded]" } else { "" }
    );

    if !result.signals.is_empty() {
        let mut t = table(&["Signal", "Indicator", "Description", "Confidence"]);
        for s in &result.signals {
            t.add_row(vec![
                signal_cell(s.signal_type),
                Cell::new(&s.indicator),
                Cell::new(&s.description),
                Cell::new(percent(s.confidence)),
            ]);
        }
        let _ = writeln!(out, "{t}");
    }

    let scalars: Vec<(&String, &Value)> = result
        .data
        .iter()
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .collect();
    if !scalars.is_empty() {
        let mut t = table(&["Metric", "Value"]);
        for (key, value) in scalars {
            t.add_row(vec![key.clone(), format_value(value)]);
        }
        let _ = writeln!(out, "{t}");
    }

    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.4}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finproof_core::Signal;
    use finproof_jobs::{JobId, JobUpdate};
    use serde_json::{Map, json};

    fn job(status: JobStatus) -> Job {
        let mut job = Job::pending("AAPL", "technical", Map::new());
        job.id = JobId(7);
        job.status = status;
        job
    }

    #[test]
    fn test_jobs_table_lists_every_job() {
        let mut failed = job(JobStatus::Failed);
        failed.error_message = Some("no market data available for AAPL".to_string());
        let rendered = jobs_table(&[job(JobStatus::Pending), failed]).to_string();
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("no market data available"));
    }

    #[test]
    fn test_counts_table_has_total() {
        let jobs = [job(JobStatus::Pending), job(JobStatus::Completed)];
        let counts: JobCounts = jobs.iter().collect();
        let rendered = counts_table(&counts).to_string();
        assert!(rendered.contains("total"));
        assert!(rendered.contains("cancelled"));
    }

    #[test]
    fn test_job_detail_with_result() {
        let mut job = job(JobStatus::Pending);
        JobUpdate::start().apply(&mut job, Utc::now());
        JobUpdate::complete().apply(&mut job, Utc::now());

        let result = AnalysisResult::new("technical", "AAPL", "Bullish setup")
            .with_confidence(0.72)
            .with_recommendation(SignalType::Buy)
            .with_signals(vec![Signal::new(SignalType::Buy, "RSI", "oversold", 0.7)])
            .with_data("rsi", json!(28.123_456))
            .with_data("closes", json!([1.0, 2.0]))
            .with_warning("thin volume");

        let rendered = job_detail(&job, Some(&result));
        assert!(rendered.contains("completed (100%)"));
        assert!(rendered.contains("duration"));
        assert!(rendered.contains("Bullish setup"));
        assert!(rendered.contains("buy (72% confidence)"));
        assert!(rendered.contains("28.1235"));
        assert!(!rendered.contains("closes"));
        assert!(rendered.contains("warning: thin volume"));
    }

    #[test]
    fn test_batch_line() {
        let summary = BatchSummary {
            completed: 2,
            failed: 1,
            total: 3,
        };
        assert_eq!(batch_line(&summary), "Executed 3 job(s): 2 completed, 1 failed");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(3)), "3");
        assert_eq!(format_value(&json!(0.5)), "0.5000");
        assert_eq!(format_value(&Value::Null), "-");
        assert_eq!(format_value(&json!("up")), "up");
    }
}
