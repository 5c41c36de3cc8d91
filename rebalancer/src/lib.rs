//! folio-rebalancer: scheduled portfolio rebalancing from the command line.
//!
//! Reads market observations from CSV, runs each configured portfolio's
//! strategy over a weekly schedule with the folio engine, and records the
//! resulting orders and holdings in a JSONL ledger with an audit trail.

pub mod audit;
pub mod config;
pub mod data;
pub mod error;
pub mod execution;
