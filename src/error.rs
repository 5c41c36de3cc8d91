//! Error types for the rebalancing engine.

use chrono::NaiveDate;

/// Record-level constraint a ledger batch can violate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("weight {weight} for {ticker} is outside [0, 1]")]
    WeightOutOfRange { ticker: String, weight: f64 },

    #[error("order quantity {quantity} for {asset} must be finite and >= 0")]
    NegativeQuantity { asset: String, quantity: f64 },

    #[error("holdings for portfolio {portfolio_id} sum to {total:.6} (> 1)")]
    OverAllocated { portfolio_id: u32, total: f64 },

    #[error("record is missing an asset name")]
    EmptyAsset,

    #[error("record for portfolio {found} staged in a batch for portfolio {expected}")]
    PortfolioMismatch { expected: u32, found: u32 },
}

/// Failures raised by a [`Ledger`](crate::ledger::Ledger).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("constraint violated: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger record {line} is corrupt: {detail}")]
    Corrupt { line: usize, detail: String },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced while evaluating a strategy on one date.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("no asset has enough history before {0}")]
    EmptyUniverse(NaiveDate),

    #[error("invalid strategy parameter: {0}")]
    InvalidParameter(String),
}

/// Top-level engine errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("schedule error: start {start} is after end {end}")]
    Schedule { start: NaiveDate, end: NaiveDate },

    #[error("strategy failed on {date}: {source}")]
    Strategy {
        date: NaiveDate,
        source: StrategyError,
    },

    #[error("failed to persist rebalance for {date}: {source}")]
    Persistence {
        date: NaiveDate,
        source: LedgerError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, Error>;
