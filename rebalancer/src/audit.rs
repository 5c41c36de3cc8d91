//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use folio::engine::RunSummary;
use serde::Serialize;

use crate::error::Result;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Log the start of a run.
pub fn log_run_started(
    audit: &mut AuditLog,
    config_path: &str,
    portfolios: &[u32],
    dry_run: bool,
) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "config": config_path,
            "portfolios": portfolios,
            "dry_run": dry_run,
        }),
    )
}

/// Log a portfolio that was already up to date with the ledger.
pub fn log_portfolio_current(audit: &mut AuditLog, portfolio_id: u32, last: NaiveDate) -> Result<()> {
    audit.log(
        "portfolio_up_to_date",
        serde_json::json!({
            "portfolio": portfolio_id,
            "last_committed": last.to_string(),
        }),
    )
}

/// Log a completed portfolio run.
pub fn log_portfolio_finished(audit: &mut AuditLog, summary: &RunSummary) -> Result<()> {
    let holdings: serde_json::Map<String, serde_json::Value> = summary
        .final_holdings
        .iter()
        .map(|(t, w)| (t.to_string(), serde_json::json!(w)))
        .collect();

    audit.log(
        "portfolio_finished",
        serde_json::json!({
            "portfolio": summary.portfolio_id,
            "evaluated": summary.dates_evaluated,
            "replayed": summary.dates_replayed,
            "skipped": summary.dates_skipped,
            "committed": summary.dates_committed,
            "orders": summary.orders_written,
            "holdings": holdings,
        }),
    )
}

/// Log a portfolio run that stopped with an error.
pub fn log_portfolio_failed(audit: &mut AuditLog, portfolio_id: u32, error: &str) -> Result<()> {
    audit.log(
        "portfolio_failed",
        serde_json::json!({
            "portfolio": portfolio_id,
            "error": error,
        }),
    )
}

/// Log run completion.
pub fn log_run_completed(audit: &mut AuditLog, succeeded: usize, failed: usize) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "succeeded": succeeded,
            "failed": failed,
        }),
    )
}
