//! High-yield-equity profile: chase trailing mean returns across equities.

use chrono::NaiveDate;
use log::{debug, warn};

use super::{Rebalance, Strategy, check_threshold, settle, universe};
use crate::error::StrategyError;
use crate::history::ReturnSeriesStore;
use crate::objective::ReturnObjective;
use crate::optimize::{
    EvolutionConfig, GeneticAlgorithm, Optimizer, is_degenerate, normalize_long_only,
};
use crate::score::{MEAN_RETURN_WINDOW, trailing_mean_return};
use crate::types::{Allocation, Category, PortfolioState, RiskProfile};

pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Genetic search over equity weights maximizing `w · μ`, where μ is each
/// equity's mean return over its trailing observation window.
pub struct PureReturn {
    pub window: usize,
    pub threshold: f64,
    pub config: EvolutionConfig,
    optimizer: Box<dyn Optimizer>,
}

impl Default for PureReturn {
    fn default() -> Self {
        Self::new()
    }
}

impl PureReturn {
    pub fn new() -> Self {
        Self {
            window: MEAN_RETURN_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            config: EvolutionConfig {
                population_size: 20,
                max_generations: 50,
                ..EvolutionConfig::genetic()
            },
            optimizer: Box::new(GeneticAlgorithm),
        }
    }

    pub fn with_config(mut self, config: EvolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
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

impl Strategy for PureReturn {
    fn risk_profile(&self) -> RiskProfile {
        RiskProfile::HighYieldEquity
    }

    fn name(&self) -> &'static str {
        "pure_return"
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        let threshold = check_threshold(self.threshold)?;
        if self.window == 0 {
            return Err(StrategyError::InvalidParameter(
                "mean-return window must be at least 1".into(),
            ));
        }

        let tickers = universe(history, Some(Category::Equity), date);
        if tickers.is_empty() {
            return Err(StrategyError::EmptyUniverse(date));
        }
        let means: Vec<f64> = tickers
            .iter()
            .map(|t| trailing_mean_return(history.observations_for(t, date), self.window))
            .collect();

        let objective = ReturnObjective::new(means);
        let best = self.optimizer.optimize(
            &|x: &[f64]| objective.evaluate(x),
            tickers.len(),
            &self.config,
        );
        if is_degenerate(&best) {
            warn!("{} {date}: optimizer returned an all-zero vector, using equal weights", self.name());
        }
        let weights = normalize_long_only(best);
        debug!(
            "{} {date}: {} equities, expected return {:.6}",
            self.name(),
            tickers.len(),
            objective.evaluate(&weights)
        );

        let target: Allocation = tickers.iter().map(|t| t.to_string()).zip(weights).collect();
        Ok(settle(self.name(), date, target, &state.holdings, threshold))
    }
}
