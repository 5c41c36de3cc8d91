//! # folio
//!
//! A weekly portfolio rebalancing engine. Given per-asset price and return
//! history and a portfolio's current weights, a risk-profile strategy picks
//! a target allocation, the difference becomes a minimal set of buy/sell
//! orders, and both are committed to a ledger as one unit.
//!
//! ## Features
//!
//! - **Strategies**: volatility targeting, pure expected return, momentum
//!   ranking under a monthly turnover cap, pairwise reallocation and
//!   SMA crossover ([`strategy`])
//! - **Optimizers**: seeded differential evolution and genetic algorithm
//!   over box-constrained weight vectors ([`optimize`])
//! - **Threshold diffing**: orders only for weight changes above a
//!   per-strategy threshold, so rebalancing is idempotent ([`diff`])
//! - **Atomic ledger batches**: in-memory or JSON Lines ([`ledger`],
//!   `persistence`)
//!
//! ## Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use folio::engine::{Engine, Schedule};
//! use folio::history::MemoryStore;
//! use folio::ledger::MemoryLedger;
//! use folio::strategy::CrossoverMomentum;
//! use folio::{Allocation, AssetObservation, Category, PortfolioState, RiskProfile};
//!
//! let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
//! let observations = (0..60).map(|i| AssetObservation {
//!     date: start + chrono::Duration::days(i),
//!     ticker: "AAPL".to_string(),
//!     category: Category::Equity,
//!     sector: "Technology".to_string(),
//!     ret: 0.01,
//!     price: 100.0 + (i * i) as f64,
//! });
//! let store = MemoryStore::from_observations(observations);
//!
//! let schedule = Schedule::new(start, start + chrono::Duration::days(56)).unwrap();
//! let portfolio = PortfolioState::new(1, RiskProfile::EquityMomentum, Allocation::new());
//! let mut ledger = MemoryLedger::new();
//!
//! let summary = Engine::new(schedule)
//!     .run(portfolio, &mut CrossoverMomentum::new(), &store, &mut ledger)
//!     .unwrap();
//! assert_eq!(summary.final_holdings.get("AAPL"), 1.0);
//! ```
//!
//! ## Weights
//!
//! Weights are fractions of portfolio value in `[0, 1]`. A portfolio's
//! weights sum to at most one; the remainder is uninvested cash.

pub mod diff;
pub mod engine;
mod error;
pub mod history;
pub mod indicators;
pub mod ledger;
pub mod objective;
pub mod optimize;
#[cfg(feature = "persistence")]
pub mod persistence;
pub mod score;
pub mod strategy;
pub mod turnover;
mod types;

// Re-export public API
pub use error::{ConstraintViolation, Error, LedgerError, Result, StrategyError};
pub use types::{
    Action, Allocation, AssetObservation, Category, Holding, Order, PortfolioState, RiskProfile,
    WEIGHT_EPSILON,
};
