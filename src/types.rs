//! Core domain types: observations, holdings, orders and allocations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

/// Tolerance used when checking that weights sum to one (or at most one).
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Asset class of an observed instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    Equity,
    #[cfg_attr(feature = "serde", serde(rename = "etf", alias = "ETF"))]
    Etf,
    SafeHaven,
    TreasuryNote,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Equity => write!(f, "equity"),
            Category::Etf => write!(f, "etf"),
            Category::SafeHaven => write!(f, "safe_haven"),
            Category::TreasuryNote => write!(f, "treasury_note"),
        }
    }
}

/// One dated observation of an asset, as supplied by the market-data feed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetObservation {
    pub date: NaiveDate,
    pub ticker: String,
    pub category: Category,
    pub sector: String,
    #[cfg_attr(feature = "serde", serde(rename = "return"))]
    pub ret: f64,
    pub price: f64,
}

/// Named strategy category governing a portfolio's objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RiskProfile {
    /// Volatility-targeted allocation.
    LowRisk,
    /// At most two trades per calendar month.
    LowTurnover,
    /// Pure expected return over equities.
    HighYieldEquity,
    /// Moving-average crossover over equities.
    EquityMomentum,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskProfile::LowRisk => write!(f, "Low Risk"),
            RiskProfile::LowTurnover => write!(f, "Low Turnover"),
            RiskProfile::HighYieldEquity => write!(f, "High Yield Equity"),
            RiskProfile::EquityMomentum => write!(f, "Equity Momentum"),
        }
    }
}

/// Trade direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// Action implied by a signed direction: positive buys, anything else sells.
    pub fn from_direction(direction: i8) -> Self {
        if direction > 0 { Action::Buy } else { Action::Sell }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

/// A persisted trade order. `quantity` is a fraction of portfolio value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    pub date: NaiveDate,
    pub portfolio_id: u32,
    pub risk_profile: RiskProfile,
    pub action: Action,
    pub asset: String,
    pub quantity: f64,
    pub sector: String,
}

/// One line of a portfolio's holdings snapshot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holding {
    pub portfolio_id: u32,
    pub ticker: String,
    pub weight: f64,
    pub as_of: NaiveDate,
}

/// Ticker → weight map, ordered by ticker.
///
/// Weights are fractions of portfolio value. Whatever is not allocated is
/// uninvested cash, so a valid allocation sums to at most one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Allocation {
    weights: BTreeMap<String, f64>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal weights across `tickers`, fully invested.
    pub fn uniform<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
        if tickers.is_empty() {
            return Self::new();
        }
        let w = 1.0 / tickers.len() as f64;
        tickers.into_iter().map(|t| (t, w)).collect()
    }

    /// Weight for `ticker`, zero when absent.
    #[inline]
    pub fn get(&self, ticker: &str) -> f64 {
        self.weights.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, ticker: impl Into<String>, weight: f64) {
        self.weights.insert(ticker.into(), weight);
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.weights.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate `(ticker, weight)` in ticker order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    /// Sum of all weights (invested fraction).
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Uninvested fraction, never negative.
    pub fn cash(&self) -> f64 {
        (1.0 - self.total()).max(0.0)
    }

    /// Drop entries whose weight is at or below `epsilon`.
    pub fn prune(&mut self, epsilon: f64) {
        self.weights.retain(|_, w| *w > epsilon);
    }

    /// Clamp every weight into [0, 1], returning the tickers that were out of range.
    ///
    /// Non-finite weights become zero.
    pub fn clamp_unit(&mut self) -> Vec<String> {
        let mut clamped = Vec::new();
        for (ticker, w) in self.weights.iter_mut() {
            if !w.is_finite() {
                *w = 0.0;
                clamped.push(ticker.clone());
            } else if *w < 0.0 || *w > 1.0 {
                *w = w.clamp(0.0, 1.0);
                clamped.push(ticker.clone());
            }
        }
        clamped
    }

    /// Holdings snapshot rows for this allocation.
    pub fn to_holdings(&self, portfolio_id: u32, as_of: NaiveDate) -> Vec<Holding> {
        self.iter()
            .map(|(ticker, weight)| Holding {
                portfolio_id,
                ticker: ticker.to_string(),
                weight,
                as_of,
            })
            .collect()
    }

    /// Rebuild an allocation from holdings rows.
    pub fn from_holdings<'a>(holdings: impl IntoIterator<Item = &'a Holding>) -> Self {
        holdings
            .into_iter()
            .map(|h| (h.ticker.clone(), h.weight))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Allocation {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().map(|(t, w)| (t.into(), w)).collect(),
        }
    }
}

/// A portfolio's current state as seen by a strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioState {
    pub portfolio_id: u32,
    pub risk_profile: RiskProfile,
    pub holdings: Allocation,
}

impl PortfolioState {
    pub fn new(portfolio_id: u32, risk_profile: RiskProfile, holdings: Allocation) -> Self {
        Self {
            portfolio_id,
            risk_profile,
            holdings,
        }
    }
}
