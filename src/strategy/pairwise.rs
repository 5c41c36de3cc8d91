//! Low-turnover profile, pairwise variant: each evaluation moves weight
//! between exactly one pair of assets.

use chrono::NaiveDate;
use log::{debug, warn};

use super::{Rebalance, Strategy, check_threshold, settle, universe};
use crate::error::StrategyError;
use crate::history::{ReturnMatrix, ReturnSeriesStore};
use crate::objective::{PairwiseObjective, column_means};
use crate::optimize::{EvolutionConfig, GeneticAlgorithm, Optimizer};
use crate::types::{Allocation, PortfolioState, RiskProfile};

pub const DEFAULT_THRESHOLD: f64 = 1e-4;

/// Genetic search over `(i, j, split)` genes. The winning move splits the
/// combined weight of assets `i` and `j`; every other holding is untouched.
pub struct PairwiseReallocation {
    pub threshold: f64,
    pub config: EvolutionConfig,
    optimizer: Box<dyn Optimizer>,
}

impl Default for PairwiseReallocation {
    fn default() -> Self {
        Self::new()
    }
}

impl PairwiseReallocation {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            config: EvolutionConfig::genetic(),
            optimizer: Box::new(GeneticAlgorithm),
        }
    }

    pub fn with_config(mut self, config: EvolutionConfig) -> Self {
        self.config = config;
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

impl Strategy for PairwiseReallocation {
    fn risk_profile(&self) -> RiskProfile {
        RiskProfile::LowTurnover
    }

    fn name(&self) -> &'static str {
        "pairwise"
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        let threshold = check_threshold(self.threshold)?;

        let with_history = universe(history, None, date);
        let matrix = ReturnMatrix::build(history, &with_history, date);
        let means = column_means(&matrix.rows);

        // Held assets without history still take part, with zero mean return.
        let mut tickers: Vec<String> = matrix.tickers.clone();
        for held in state.holdings.tickers() {
            if !tickers.iter().any(|t| t == held) {
                tickers.push(held.to_string());
            }
        }
        tickers.sort();
        if tickers.len() < 2 {
            return Err(StrategyError::EmptyUniverse(date));
        }

        let mean_of = |t: &str| {
            matrix
                .tickers
                .iter()
                .position(|m| m == t)
                .and_then(|j| means.get(j).copied())
                .unwrap_or(0.0)
        };
        let objective = PairwiseObjective::new(
            tickers.iter().map(|t| state.holdings.get(t)).collect(),
            tickers.iter().map(|t| mean_of(t)).collect(),
        );

        let genes = self.optimizer.optimize(
            &|x: &[f64]| objective.evaluate(x),
            PairwiseObjective::GENES,
            &self.config,
        );
        let Some(mv) = objective.decode(&genes) else {
            warn!("{} {date}: no valid pair found, holdings unchanged", self.name());
            return Ok(settle(
                self.name(),
                date,
                state.holdings.clone(),
                &state.holdings,
                threshold,
            ));
        };
        debug!(
            "{} {date}: {} / {} split {:.4}",
            self.name(),
            tickers[mv.i],
            tickers[mv.j],
            mv.split
        );

        let target: Allocation = tickers.into_iter().zip(objective.apply(mv)).collect();
        Ok(settle(self.name(), date, target, &state.holdings, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use crate::history::fixtures::{day, obs};
    use crate::types::Action;

    fn store() -> MemoryStore {
        let mut data = Vec::new();
        for d in 0..30 {
            data.push(obs("BEST", d, 100.0, 0.02));
            data.push(obs("MID", d, 100.0, 0.005));
            data.push(obs("WORST", d, 100.0, -0.01));
        }
        MemoryStore::from_observations(data)
    }

    #[test]
    fn moves_weight_into_best_asset() {
        let holdings: Allocation = [("BEST", 0.2), ("MID", 0.3), ("WORST", 0.5)]
            .into_iter()
            .collect();
        let state = PortfolioState::new(5, RiskProfile::LowTurnover, holdings.clone());
        let mut strategy =
            PairwiseReallocation::new().with_config(EvolutionConfig::genetic().with_seed(3));
        let rebalance = strategy.run(day(30), &state, &store()).unwrap();

        // the only change is between two assets, so the total is preserved
        assert!((rebalance.target.total() - holdings.total()).abs() < 1e-9);
        assert!(rebalance.orders.len() <= 2);
        assert!(rebalance.target.get("BEST") > 0.2);
        let buy = rebalance.orders.iter().find(|o| o.action == Action::Buy).unwrap();
        assert_eq!(buy.asset, "BEST");
    }

    #[test]
    fn single_asset_is_empty_universe() {
        let store = MemoryStore::from_observations(vec![obs("ONLY", 0, 1.0, 0.0)]);
        let state = PortfolioState::new(5, RiskProfile::LowTurnover, Allocation::new());
        let err = PairwiseReallocation::new()
            .run(day(1), &state, &store)
            .unwrap_err();
        assert!(matches!(err, StrategyError::EmptyUniverse(_)));
    }
}
