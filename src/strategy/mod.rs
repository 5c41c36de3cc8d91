//! Risk-profile strategies.
//!
//! Every strategy implements [`Strategy`]: given an evaluation date, the
//! portfolio's current holdings and read-only history, it returns a target
//! allocation together with the orders that move the portfolio there.
//!
//! | Strategy | Profile | Method |
//! |---|---|---|
//! | [`VolatilityTarget`] | Low Risk | differential evolution on a vol-target objective |
//! | [`PureReturn`] | High Yield Equity | GA on trailing mean returns of equities |
//! | [`MomentumRanking`] | Low Turnover | momentum-distance ranking, two trades a month |
//! | [`PairwiseReallocation`] | Low Turnover | GA choosing one pair of assets to rebalance |
//! | [`CrossoverMomentum`] | Equity Momentum | SMA10/SMA30 crossover, equal weight across buys |

pub mod crossover;
pub mod momentum_ranking;
pub mod pairwise;
pub mod pure_return;
pub mod volatility_target;

pub use crossover::CrossoverMomentum;
pub use momentum_ranking::MomentumRanking;
pub use pairwise::PairwiseReallocation;
pub use pure_return::PureReturn;
pub use volatility_target::VolatilityTarget;

use chrono::NaiveDate;
use log::warn;

use crate::diff::{OrderGenerator, RebalanceOrder};
use crate::error::StrategyError;
use crate::history::ReturnSeriesStore;
use crate::types::{Allocation, Category, PortfolioState, RiskProfile};

/// Output of one strategy evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rebalance {
    pub target: Allocation,
    pub orders: Vec<RebalanceOrder>,
}

impl Rebalance {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// A risk-profile-specific rebalancing rule.
pub trait Strategy {
    fn risk_profile(&self) -> RiskProfile;

    /// Short identifier used in logs and config.
    fn name(&self) -> &'static str;

    /// Called once before the first evaluation of a run.
    ///
    /// `step_days` is the spacing of the evaluation schedule.
    fn prepare(&mut self, _start: NaiveDate, _step_days: i64, _history: &dyn ReturnSeriesStore) {}

    /// Advance internal state across a date an earlier run already
    /// committed, without producing orders.
    fn replay(&mut self, _date: NaiveDate, _history: &dyn ReturnSeriesStore) {}

    /// Compute the target allocation and orders for `date`.
    ///
    /// `history` only ever exposes observations dated strictly before `date`.
    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn risk_profile(&self) -> RiskProfile {
        (**self).risk_profile()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn prepare(&mut self, start: NaiveDate, step_days: i64, history: &dyn ReturnSeriesStore) {
        (**self).prepare(start, step_days, history)
    }

    fn replay(&mut self, date: NaiveDate, history: &dyn ReturnSeriesStore) {
        (**self).replay(date, history)
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        (**self).run(date, state, history)
    }
}

/// Tickers (optionally restricted to one category) with at least one
/// observation before `date`, sorted.
pub(crate) fn universe<'a>(
    history: &'a dyn ReturnSeriesStore,
    category: Option<Category>,
    date: NaiveDate,
) -> Vec<&'a str> {
    let tickers = match category {
        Some(c) => history.tickers_in(c),
        None => history.tickers(),
    };
    tickers
        .into_iter()
        .filter(|t| !history.observations_for(t, date).is_empty())
        .collect()
}

/// Clamp drifted weights, drop zeros and diff against the current holdings.
pub(crate) fn settle(
    strategy: &str,
    date: NaiveDate,
    mut target: Allocation,
    current: &Allocation,
    threshold: f64,
) -> Rebalance {
    let clamped = target.clamp_unit();
    if !clamped.is_empty() {
        warn!("{strategy} {date}: clamped out-of-range weights for {clamped:?}");
    }
    target.prune(0.0);

    let orders = OrderGenerator::new(threshold).generate(&target, current);
    Rebalance { target, orders }
}

fn check_threshold(threshold: f64) -> Result<f64, StrategyError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(StrategyError::InvalidParameter(format!(
            "order threshold must be finite and >= 0, got {threshold}"
        )))
    }
}
