//! Error types for the rebalancer.

use std::path::PathBuf;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read observations from {path}: {source}")]
    DataRead { path: PathBuf, source: csv::Error },

    #[error("invalid observation on line {line}: {detail}")]
    Data { line: u64, detail: String },

    #[error("no portfolio with id {0} in config")]
    UnknownPortfolio(u32),

    #[error(transparent)]
    Engine(#[from] folio::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] folio::LedgerError),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
