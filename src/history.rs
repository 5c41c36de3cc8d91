//! Read-only access to per-asset return/price history.
//!
//! The engine never fetches market data itself. It reads through the
//! [`ReturnSeriesStore`] trait, which always hands back observations that
//! are strictly older than the evaluation date, oldest first.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::types::{AssetObservation, Category};

/// Query surface over the observation feed.
pub trait ReturnSeriesStore {
    /// All known tickers, sorted.
    fn tickers(&self) -> Vec<&str>;

    /// Observations of `ticker` dated strictly before `before`, ascending.
    fn observations_for(&self, ticker: &str, before: NaiveDate) -> &[AssetObservation];

    /// Observations of every asset in `category` dated strictly before
    /// `before`, ascending by date then ticker.
    fn observations_for_category(
        &self,
        category: Category,
        before: NaiveDate,
    ) -> Vec<&AssetObservation>;

    /// Whether any asset has an observation dated exactly `date`.
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// Latest known sector of `ticker`.
    fn sector_of(&self, ticker: &str) -> Option<&str>;

    /// Category of `ticker`.
    fn category_of(&self, ticker: &str) -> Option<Category>;

    /// Tickers in `category`, sorted.
    fn tickers_in(&self, category: Category) -> Vec<&str> {
        self.tickers()
            .into_iter()
            .filter(|t| self.category_of(t) == Some(category))
            .collect()
    }
}

/// In-memory store indexed by ticker.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    series: FxHashMap<String, Vec<AssetObservation>>,
    dates: BTreeSet<NaiveDate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from observations in any order.
    pub fn from_observations(observations: impl IntoIterator<Item = AssetObservation>) -> Self {
        let mut store = Self::new();
        store.extend(observations);
        store
    }

    /// Append observations, keeping every series sorted by date.
    ///
    /// A second observation for the same `(ticker, date)` replaces the first.
    pub fn extend(&mut self, observations: impl IntoIterator<Item = AssetObservation>) {
        let mut touched: Vec<String> = Vec::new();
        for obs in observations {
            self.dates.insert(obs.date);
            let series = self.series.entry(obs.ticker.clone()).or_default();
            if series.last().is_some_and(|last| last.date >= obs.date) {
                touched.push(obs.ticker.clone());
            }
            series.push(obs);
        }

        touched.sort();
        touched.dedup();
        for ticker in touched {
            if let Some(series) = self.series.get_mut(&ticker) {
                // Stable sort keeps insertion order within a date, so the
                // later duplicate survives dedup below.
                series.sort_by_key(|o| o.date);
                let mut deduped: Vec<AssetObservation> = Vec::with_capacity(series.len());
                for obs in series.drain(..) {
                    match deduped.last_mut() {
                        Some(last) if last.date == obs.date => *last = obs,
                        _ => deduped.push(obs),
                    }
                }
                *series = deduped;
            }
        }
    }

    /// Number of observations across all assets.
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// First and last observed dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }
}

impl ReturnSeriesStore for MemoryStore {
    fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.series.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    fn observations_for(&self, ticker: &str, before: NaiveDate) -> &[AssetObservation] {
        match self.series.get(ticker) {
            Some(series) => {
                let end = series.partition_point(|o| o.date < before);
                &series[..end]
            }
            None => &[],
        }
    }

    fn observations_for_category(
        &self,
        category: Category,
        before: NaiveDate,
    ) -> Vec<&AssetObservation> {
        let mut out: Vec<&AssetObservation> = self
            .series
            .values()
            .filter(|s| s.last().is_some_and(|o| o.category == category))
            .flat_map(|s| {
                let end = s.partition_point(|o| o.date < before);
                s[..end].iter()
            })
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        out
    }

    fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    fn sector_of(&self, ticker: &str) -> Option<&str> {
        self.series
            .get(ticker)
            .and_then(|s| s.last())
            .map(|o| o.sector.as_str())
    }

    fn category_of(&self, ticker: &str) -> Option<Category> {
        self.series
            .get(ticker)
            .and_then(|s| s.last())
            .map(|o| o.category)
    }
}

/// Returns of several assets aligned on the union of their dates.
///
/// Rows are dates (ascending), columns follow `tickers`. A missing
/// observation contributes a zero return.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Pivot the history of `tickers` before `before` into a matrix.
    ///
    /// Tickers without any observation are dropped.
    pub fn build<S: ReturnSeriesStore + ?Sized>(
        store: &S,
        tickers: &[&str],
        before: NaiveDate,
    ) -> Self {
        let mut columns: Vec<(String, &[AssetObservation])> = tickers
            .iter()
            .map(|t| (t.to_string(), store.observations_for(t, before)))
            .filter(|(_, obs)| !obs.is_empty())
            .collect();
        columns.sort_by(|a, b| a.0.cmp(&b.0));

        let dates: Vec<NaiveDate> = columns
            .iter()
            .flat_map(|(_, obs)| obs.iter().map(|o| o.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: FxHashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut rows = vec![vec![0.0; columns.len()]; dates.len()];
        for (j, (_, obs)) in columns.iter().enumerate() {
            for o in obs.iter() {
                if o.ret.is_finite() {
                    rows[row_of[&o.date]][j] = o.ret;
                }
            }
        }

        Self {
            tickers: columns.into_iter().map(|(t, _)| t).collect(),
            dates,
            rows,
        }
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_periods(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(offset)
    }

    pub fn obs(ticker: &str, offset: i64, price: f64, ret: f64) -> AssetObservation {
        AssetObservation {
            date: day(offset),
            ticker: ticker.to_string(),
            category: Category::Equity,
            sector: "Technology".to_string(),
            ret,
            price,
        }
    }

    /// One observation per day for each price, returns derived from prices.
    pub fn series(ticker: &str, category: Category, prices: &[f64]) -> Vec<AssetObservation> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let ret = if i == 0 { 0.0 } else { p / prices[i - 1] - 1.0 };
                AssetObservation {
                    category,
                    ..obs(ticker, i as i64, p, ret)
                }
            })
            .collect()
    }
}
