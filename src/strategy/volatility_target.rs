//! Low-risk profile: hold annualized volatility at a target.

use chrono::NaiveDate;
use log::{debug, warn};

use super::{Rebalance, Strategy, check_threshold, settle, universe};
use crate::error::StrategyError;
use crate::history::{ReturnMatrix, ReturnSeriesStore};
use crate::objective::{DEFAULT_TARGET_VOL, DEFAULT_VOL_PENALTY, VolTargetObjective};
use crate::optimize::{
    DifferentialEvolution, EvolutionConfig, Optimizer, is_degenerate, normalize_long_only,
};
use crate::types::{Allocation, PortfolioState, RiskProfile};

pub const DEFAULT_THRESHOLD: f64 = 1e-3;

/// Differential evolution over every ticker with history, maximizing
/// return minus a penalty on the distance to the volatility target.
pub struct VolatilityTarget {
    pub target_vol: f64,
    pub penalty: f64,
    pub threshold: f64,
    pub config: EvolutionConfig,
    optimizer: Box<dyn Optimizer>,
}

impl Default for VolatilityTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl VolatilityTarget {
    pub fn new() -> Self {
        Self {
            target_vol: DEFAULT_TARGET_VOL,
            penalty: DEFAULT_VOL_PENALTY,
            threshold: DEFAULT_THRESHOLD,
            config: EvolutionConfig::differential(),
            optimizer: Box::new(DifferentialEvolution),
        }
    }

    pub fn with_config(mut self, config: EvolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_target(mut self, target_vol: f64, penalty: f64) -> Self {
        self.target_vol = target_vol;
        self.penalty = penalty;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }
}

impl Strategy for VolatilityTarget {
    fn risk_profile(&self) -> RiskProfile {
        RiskProfile::LowRisk
    }

    fn name(&self) -> &'static str {
        "volatility_target"
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        let threshold = check_threshold(self.threshold)?;
        if !(self.target_vol.is_finite() && self.target_vol > 0.0) {
            return Err(StrategyError::InvalidParameter(format!(
                "target volatility must be positive, got {}",
                self.target_vol
            )));
        }

        let tickers = universe(history, None, date);
        let matrix = ReturnMatrix::build(history, &tickers, date);
        if matrix.n_assets() == 0 || matrix.n_periods() < 2 {
            return Err(StrategyError::EmptyUniverse(date));
        }

        let objective = VolTargetObjective::from_returns(&matrix.rows)
            .with_target(self.target_vol, self.penalty);
        let best = self.optimizer.optimize(
            &|x: &[f64]| objective.evaluate(x),
            matrix.n_assets(),
            &self.config,
        );
        if is_degenerate(&best) {
            warn!("{} {date}: optimizer returned an all-zero vector, using equal weights", self.name());
        }
        let weights = normalize_long_only(best);
        debug!(
            "{} {date}: {} assets, annualized vol {:.4}",
            self.name(),
            matrix.n_assets(),
            objective.annualized_vol(&weights)
        );

        let target: Allocation = matrix.tickers.iter().cloned().zip(weights).collect();
        Ok(settle(self.name(), date, target, &state.holdings, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use crate::history::fixtures::{day, obs};
    use crate::types::WEIGHT_EPSILON;

    fn alternating_store(days: i64) -> MemoryStore {
        let mut data = Vec::new();
        for d in 0..days {
            let sign = if d % 2 == 0 { 1.0 } else { -1.0 };
            data.push(obs("CALM", d, 100.0, 0.001 + sign * 0.003));
            data.push(obs("WILD", d, 100.0, 0.002 - sign * 0.012));
        }
        MemoryStore::from_observations(data)
    }

    fn state() -> PortfolioState {
        PortfolioState::new(1, RiskProfile::LowRisk, Allocation::new())
    }

    #[test]
    fn fully_invested_target() {
        let store = alternating_store(60);
        let mut strategy =
            VolatilityTarget::new().with_config(EvolutionConfig::differential().with_seed(7));
        let rebalance = strategy.run(day(60), &state(), &store).unwrap();

        assert!((rebalance.target.total() - 1.0).abs() < WEIGHT_EPSILON);
        assert!(rebalance.target.iter().all(|(_, w)| (0.0..=1.0).contains(&w)));
        assert!(!rebalance.orders.is_empty());
    }

    #[test]
    fn no_history_is_empty_universe() {
        let store = alternating_store(10);
        let err = VolatilityTarget::new().run(day(0), &state(), &store).unwrap_err();
        assert!(matches!(err, StrategyError::EmptyUniverse(d) if d == day(0)));
    }

    #[test]
    fn rejects_negative_threshold() {
        let store = alternating_store(10);
        let err = VolatilityTarget::new()
            .with_threshold(-1.0)
            .run(day(10), &state(), &store)
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParameter(_)));
    }
}
