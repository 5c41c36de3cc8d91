//! Observation CSV loading.
//!
//! Expected columns, with a header row:
//!
//! ```csv
//! date,ticker,category,sector,return,price
//! 2023-01-03,AAPL,equity,Technology,0.0123,125.07
//! 2023-01-03,TLT,treasury_note,Government,,104.10
//! ```
//!
//! An empty `return` or `price` cell is read as NaN; the scoring code treats
//! such observations as missing.

use std::path::Path;

use chrono::NaiveDate;
use folio::history::MemoryStore;
use folio::{AssetObservation, Category};
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ObservationRow {
    date: NaiveDate,
    ticker: String,
    category: String,
    #[serde(default)]
    sector: Option<String>,
    #[serde(rename = "return", default)]
    ret: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
}

/// Parse a category name, accepting common spellings.
pub fn parse_category(raw: &str) -> Option<Category> {
    let key: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    match key.as_str() {
        "equity" | "equities" | "stock" => Some(Category::Equity),
        "etf" => Some(Category::Etf),
        "safe_haven" | "safehaven" => Some(Category::SafeHaven),
        "treasury_note" | "treasury" | "treasurynote" => Some(Category::TreasuryNote),
        _ => None,
    }
}

/// Load every observation of `path` into a [`MemoryStore`].
pub fn load_observations(path: &Path) -> Result<MemoryStore> {
    info!("Loading observations from {}", path.display());
    let read_err = |source: csv::Error| Error::DataRead {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;
    let headers = reader.headers().map_err(read_err)?.clone();

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let row: ObservationRow = record.deserialize(Some(&headers)).map_err(|e| Error::Data {
            line,
            detail: e.to_string(),
        })?;
        observations.push(to_observation(row, line)?);
    }

    debug!("Read {} observations", observations.len());
    Ok(MemoryStore::from_observations(observations))
}

fn to_observation(row: ObservationRow, line: u64) -> Result<AssetObservation> {
    if row.ticker.is_empty() {
        return Err(Error::Data {
            line,
            detail: "empty ticker".into(),
        });
    }
    let category = parse_category(&row.category).ok_or_else(|| Error::Data {
        line,
        detail: format!("unknown category '{}'", row.category),
    })?;

    Ok(AssetObservation {
        date: row.date,
        ticker: row.ticker,
        category,
        sector: row
            .sector
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| folio::diff::UNKNOWN_SECTOR.to_string()),
        ret: row.ret.unwrap_or(f64::NAN),
        price: row.price.unwrap_or(f64::NAN),
    })
}
