//! Low-turnover profile: trade the strongest momentum-distance scores,
//! at most twice per calendar month.

use chrono::NaiveDate;
use log::{debug, info};

use super::{Rebalance, Strategy, check_threshold, settle, universe};
use crate::error::StrategyError;
use crate::history::ReturnSeriesStore;
use crate::score::{Score, momentum_distance};
use crate::turnover::{TradeSignal, TurnoverController, seed_date};
use crate::types::{Action, Allocation, PortfolioState, RiskProfile};

pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Fraction of portfolio value moved by one accepted trade.
pub const DEFAULT_TRADE_FRACTION: f64 = 0.10;

/// Ranks every ticker by [`momentum_distance`] and lets the
/// [`TurnoverController`] decide which of the leaders to trade.
#[derive(Clone, Debug)]
pub struct MomentumRanking {
    pub trade_fraction: f64,
    pub threshold: f64,
    controller: TurnoverController,
}

impl Default for MomentumRanking {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentumRanking {
    pub fn new() -> Self {
        Self {
            trade_fraction: DEFAULT_TRADE_FRACTION,
            threshold: DEFAULT_THRESHOLD,
            controller: TurnoverController::new(),
        }
    }

    pub fn with_trade_fraction(mut self, trade_fraction: f64) -> Self {
        self.trade_fraction = trade_fraction;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_controller(mut self, controller: TurnoverController) -> Self {
        self.controller = controller;
        self
    }

    pub fn controller(&self) -> &TurnoverController {
        &self.controller
    }

    /// Scores of every ticker with enough history before `date`.
    pub fn scores(date: NaiveDate, history: &dyn ReturnSeriesStore) -> Vec<Score> {
        universe(history, None, date)
            .into_iter()
            .filter_map(|t| {
                let score = momentum_distance(t, date, history.observations_for(t, date));
                if score.is_none() {
                    debug!("momentum_ranking {date}: {t} has no defined score");
                }
                score
            })
            .collect()
    }

    /// Apply accepted signals to `holdings`, trading against cash.
    fn realize(&self, holdings: &Allocation, signals: &[TradeSignal]) -> Allocation {
        let mut target = holdings.clone();
        for signal in signals {
            let held = target.get(&signal.ticker);
            match signal.action {
                Action::Buy => {
                    let amount = self.trade_fraction.min(target.cash());
                    if amount > 0.0 {
                        target.set(signal.ticker.clone(), held + amount);
                    }
                }
                Action::Sell => {
                    let amount = self.trade_fraction.min(held);
                    if amount > 0.0 {
                        target.set(signal.ticker.clone(), held - amount);
                    }
                }
            }
        }
        target
    }
}

impl Strategy for MomentumRanking {
    fn risk_profile(&self) -> RiskProfile {
        RiskProfile::LowTurnover
    }

    fn name(&self) -> &'static str {
        "momentum_ranking"
    }

    fn prepare(&mut self, start: NaiveDate, step_days: i64, history: &dyn ReturnSeriesStore) {
        let seed = seed_date(start, step_days);
        let scores = Self::scores(seed, history);
        self.controller.seed(&scores);
        info!(
            "{} seeded from {seed} ({} scores), threshold {:.6}",
            self.name(),
            scores.len(),
            self.controller.threshold()
        );
    }

    fn replay(&mut self, date: NaiveDate, history: &dyn ReturnSeriesStore) {
        let scores = Self::scores(date, history);
        let signals = self.controller.step(date, &scores);
        debug!("{} {date}: replayed {} signals", self.name(), signals.len());
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        let threshold = check_threshold(self.threshold)?;
        if !(self.trade_fraction > 0.0 && self.trade_fraction <= 1.0) {
            return Err(StrategyError::InvalidParameter(format!(
                "trade fraction must be in (0, 1], got {}",
                self.trade_fraction
            )));
        }

        let scores = Self::scores(date, history);
        let signals = self.controller.step(date, &scores);
        for s in &signals {
            debug!("{} {date}: {} {} (score {:.6})", self.name(), s.action, s.ticker, s.score);
        }

        let target = self.realize(&state.holdings, &signals);
        Ok(settle(self.name(), date, target, &state.holdings, threshold))
    }
}
