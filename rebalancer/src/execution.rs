//! Run orchestration: load data → resume from ledger → run engine → report.
//!
//! This is the main workflow that ties together all components.

use chrono::{Duration, NaiveDate};
use folio::engine::{Engine, RunSummary, Schedule};
use folio::history::{MemoryStore, ReturnSeriesStore};
use folio::ledger::{Ledger, LedgerBatch, MemoryLedger};
use folio::persistence::JsonlLedger;
use folio::{Allocation, Category, PortfolioState};
use log::{error, info};

use crate::audit::{self, AuditLog};
use crate::config::{Config, PortfolioConfig, ScheduleConfig};
use crate::data;
use crate::error::Result;

/// Options for a rebalance run.
pub struct RunOptions {
    pub dry_run: bool,
    pub portfolio: Option<u32>,
    pub config_file: String,
}

/// Where a portfolio picks up relative to its ledger history.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    /// Run the configured `schedule` from `holdings`. Dates up to
    /// `last_committed` are replayed, not re-evaluated.
    Start {
        schedule: Schedule,
        holdings: Allocation,
        last_committed: Option<NaiveDate>,
    },
    /// Every scheduled date is at or before the last committed batch.
    UpToDate { last_committed: NaiveDate },
}

/// First scheduled date strictly after `last`.
fn next_scheduled(schedule: &ScheduleConfig, last: NaiveDate) -> NaiveDate {
    if last < schedule.start {
        return schedule.start;
    }
    let steps = (last - schedule.start).num_days() / schedule.step_days + 1;
    schedule.start + Duration::days(steps * schedule.step_days)
}

/// Decide where `portfolio` resumes given what `ledger` already holds.
pub fn resume(
    portfolio: &PortfolioConfig,
    schedule: &ScheduleConfig,
    ledger: &dyn Ledger,
) -> Result<Resume> {
    let Some(batch) = ledger.latest_batch(portfolio.id)? else {
        return Ok(Resume::Start {
            schedule: schedule.to_schedule()?,
            holdings: portfolio.initial_holdings(),
            last_committed: None,
        });
    };

    if next_scheduled(schedule, batch.date) > schedule.end {
        return Ok(Resume::UpToDate {
            last_committed: batch.date,
        });
    }
    Ok(Resume::Start {
        schedule: schedule.to_schedule()?,
        holdings: Allocation::from_holdings(&batch.holdings),
        last_committed: Some(batch.date),
    })
}

/// Run one portfolio, reading history from and writing batches to `ledger`.
///
/// Returns `None` when the ledger is already past the configured schedule.
pub fn run_portfolio(
    portfolio: &PortfolioConfig,
    schedule: &ScheduleConfig,
    store: &dyn ReturnSeriesStore,
    ledger: &mut dyn Ledger,
) -> Result<Option<RunSummary>> {
    let (engine, holdings) = match resume(portfolio, schedule, &*ledger)? {
        Resume::UpToDate { last_committed } => {
            info!(
                "portfolio {}: up to date (last batch {last_committed})",
                portfolio.label()
            );
            return Ok(None);
        }
        Resume::Start {
            schedule: full,
            holdings,
            last_committed: None,
        } => (Engine::new(full), holdings),
        Resume::Start {
            schedule: full,
            holdings,
            last_committed: Some(last),
        } => {
            info!(
                "portfolio {}: resuming after {last} at {}",
                portfolio.label(),
                next_scheduled(schedule, last)
            );
            (Engine::new(full).resuming_after(last), holdings)
        }
    };

    let mut strategy = portfolio.build_strategy();
    let state = PortfolioState::new(portfolio.id, strategy.risk_profile(), holdings);
    let summary = engine.run(state, strategy.as_mut(), store, ledger)?;
    Ok(Some(summary))
}

/// Ledger whose reads see the on-disk history but whose writes stay in memory.
struct DryRunLedger {
    history: Option<JsonlLedger>,
    staged: MemoryLedger,
}

impl Ledger for DryRunLedger {
    fn write_batch(&mut self, batch: LedgerBatch) -> std::result::Result<(), folio::LedgerError> {
        self.staged.write_batch(batch)
    }

    fn batches_for(
        &self,
        portfolio_id: u32,
    ) -> std::result::Result<Vec<LedgerBatch>, folio::LedgerError> {
        let mut batches = match &self.history {
            Some(ledger) => ledger.batches_for(portfolio_id)?,
            None => Vec::new(),
        };
        batches.extend(self.staged.batches_for(portfolio_id)?);
        Ok(batches)
    }
}

/// Execute a full run over the selected portfolios.
pub fn run(config: &Config, opts: &RunOptions) -> Result<Vec<RunSummary>> {
    let portfolios = config.select(opts.portfolio)?;
    let store = data::load_observations(&config.data.path)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    let ids: Vec<u32> = portfolios.iter().map(|p| p.id).collect();
    audit::log_run_started(&mut audit, &opts.config_file, &ids, opts.dry_run)?;

    let mut ledger: Box<dyn Ledger> = if opts.dry_run {
        // A dry run must not create the ledger file or its directory.
        let history = if config.ledger.path.exists() {
            Some(JsonlLedger::open(&config.ledger.path)?)
        } else {
            None
        };
        Box::new(DryRunLedger {
            history,
            staged: MemoryLedger::new(),
        })
    } else {
        Box::new(JsonlLedger::open(&config.ledger.path)?)
    };

    let mut summaries = Vec::new();
    for portfolio in portfolios {
        let outcome = run_portfolio(portfolio, &config.schedule, &store, ledger.as_mut());
        match outcome {
            Ok(Some(summary)) => {
                audit::log_portfolio_finished(&mut audit, &summary)?;
                display_summary(portfolio, &summary, opts.dry_run);
                summaries.push(summary);
            }
            Ok(None) => {
                if let Some(batch) = ledger.latest_batch(portfolio.id)? {
                    audit::log_portfolio_current(&mut audit, portfolio.id, batch.date)?;
                }
                println!("{}: up to date", portfolio.label());
            }
            Err(e) => {
                error!("portfolio {} failed: {e}", portfolio.label());
                audit::log_portfolio_failed(&mut audit, portfolio.id, &e.to_string())?;
                audit::log_run_completed(&mut audit, summaries.len(), 1)?;
                return Err(e);
            }
        }
    }

    audit::log_run_completed(&mut audit, summaries.len(), 0)?;
    if opts.dry_run {
        println!("\n[DRY RUN] Nothing written to {}.", config.ledger.path.display());
    }
    Ok(summaries)
}

/// Show the latest committed holdings of the selected portfolios.
pub fn show_holdings(config: &Config, portfolio: Option<u32>) -> Result<()> {
    let portfolios = config.select(portfolio)?;
    if !config.ledger.path.exists() {
        println!("No ledger at {}.", config.ledger.path.display());
        return Ok(());
    }
    let ledger = JsonlLedger::open(&config.ledger.path)?;

    for p in portfolios {
        match ledger.latest_batch(p.id)? {
            Some(batch) => {
                println!("{} as of {}:", p.label(), batch.date);
                display_allocation(&Allocation::from_holdings(&batch.holdings));
            }
            None => println!("{}: no committed batches", p.label()),
        }
    }
    Ok(())
}

const CATEGORIES: [Category; 4] = [
    Category::Equity,
    Category::Etf,
    Category::SafeHaven,
    Category::TreasuryNote,
];

/// Validate config and data, and print what a run would work with.
pub fn check(config: &Config) -> Result<MemoryStore> {
    let store = data::load_observations(&config.data.path)?;

    print!("Observations: {} across {} tickers", store.len(), store.tickers().len());
    match store.date_range() {
        Some((first, last)) => println!(" ({first} to {last})"),
        None => println!(),
    }
    for category in CATEGORIES {
        let n = store.tickers_in(category).len();
        if n > 0 {
            let name = category.to_string();
            println!("  {name:14} {n:>4} tickers");
        }
    }

    println!(
        "Schedule: {} to {} every {} days",
        config.schedule.start, config.schedule.end, config.schedule.step_days
    );
    for p in &config.portfolios {
        let strategy = p.build_strategy();
        println!(
            "  {:20} {:10} {} ({} initial holdings)",
            p.label(),
            strategy.name(),
            strategy.risk_profile(),
            p.holdings.len()
        );
    }
    Ok(store)
}

// === Helpers ===

fn display_summary(portfolio: &PortfolioConfig, summary: &RunSummary, dry_run: bool) {
    let verb = if dry_run { "would commit" } else { "committed" };
    println!(
        "{}: {} dates evaluated, {} replayed, {} skipped, {verb} {} batches with {} orders",
        portfolio.label(),
        summary.dates_evaluated,
        summary.dates_replayed,
        summary.dates_skipped,
        summary.dates_committed,
        summary.orders_written,
    );
    display_allocation(&summary.final_holdings);
}

fn display_allocation(holdings: &Allocation) {
    for (ticker, weight) in holdings.iter() {
        println!("  {ticker:8} {:>7.2}%", weight * 100.0);
    }
    println!("  {:8} {:>7.2}%", "CASH", holdings.cash() * 100.0);
}
