//! Monthly-capped trade gating for the low-turnover ranking strategy.
//!
//! The controller ranks scored assets every week and lets at most
//! [`MAX_TRADES_PER_MONTH`] of them through per calendar month. An asset
//! only qualifies when its score beats the mean of the three best scores
//! seen at the last evaluation of the previous month.

use chrono::{Datelike, Duration, NaiveDate};

use crate::score::Score;
use crate::types::Action;

pub const MAX_TRADES_PER_MONTH: u8 = 2;

/// How many of the top scores feed the next month's threshold.
pub const THRESHOLD_TOP_N: usize = 3;

/// A trade the controller has let through.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeSignal {
    pub ticker: String,
    pub action: Action,
    pub score: f64,
}

/// Per-portfolio turnover state.
#[derive(Clone, Debug)]
pub struct TurnoverController {
    trades_this_month: u8,
    last_evaluation: Option<NaiveDate>,
    /// Magnitudes from the last evaluation, descending.
    last_ranking: Vec<f64>,
    threshold: f64,
}

impl Default for TurnoverController {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnoverController {
    /// Unseeded controller: no trade passes until a ranking has been observed.
    pub fn new() -> Self {
        Self {
            trades_this_month: 0,
            last_evaluation: None,
            last_ranking: Vec::new(),
            threshold: f64::INFINITY,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::new()
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn trades_this_month(&self) -> u8 {
        self.trades_this_month
    }

    pub fn last_evaluation(&self) -> Option<NaiveDate> {
        self.last_evaluation
    }

    /// Set the threshold from a prior-month ranking.
    ///
    /// An empty ranking leaves the threshold at +∞.
    pub fn seed(&mut self, scores: &[Score]) {
        let ranking = descending_magnitudes(scores);
        self.threshold = top_mean(&ranking, THRESHOLD_TOP_N).unwrap_or(f64::INFINITY);
    }

    /// Evaluate one date and return the trades allowed through, best first.
    pub fn step(&mut self, date: NaiveDate, scores: &[Score]) -> Vec<TradeSignal> {
        let new_month = self.last_evaluation.is_some_and(|last| !same_month(last, date));
        if new_month {
            self.trades_this_month = 0;
            if let Some(t) = top_mean(&self.last_ranking, THRESHOLD_TOP_N) {
                self.threshold = t;
            }
        }

        let ranked = rank(scores);
        let mut signals = Vec::new();
        for score in ranked.iter().take(MAX_TRADES_PER_MONTH as usize) {
            if self.trades_this_month >= MAX_TRADES_PER_MONTH {
                break;
            }
            if score.magnitude <= self.threshold {
                break;
            }
            self.trades_this_month += 1;
            signals.push(TradeSignal {
                ticker: score.ticker.clone(),
                action: score.action(),
                score: score.magnitude,
            });
        }

        self.last_ranking = ranked.iter().map(|s| s.magnitude).collect();
        self.last_evaluation = Some(date);
        signals
    }
}

/// Last date `start − k·step_days` (k ≥ 1) that falls in the month before `start`.
pub fn seed_date(start: NaiveDate, step_days: i64) -> NaiveDate {
    let step = Duration::days(step_days.max(1));
    let mut date = start - step;
    while same_month(date, start) {
        date -= step;
    }
    date
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Scores sorted descending by magnitude, ties broken by ticker.
fn rank(scores: &[Score]) -> Vec<&Score> {
    let mut ranked: Vec<&Score> = scores.iter().filter(|s| s.magnitude.is_finite()).collect();
    ranked.sort_by(|a, b| {
        b.magnitude
            .total_cmp(&a.magnitude)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    ranked
}

fn descending_magnitudes(scores: &[Score]) -> Vec<f64> {
    rank(scores).iter().map(|s| s.magnitude).collect()
}

fn top_mean(descending: &[f64], n: usize) -> Option<f64> {
    let top = &descending[..descending.len().min(n)];
    if top.is_empty() {
        return None;
    }
    Some(top.iter().sum::<f64>() / top.len() as f64)
}
