//! Equity-momentum profile: SMA10/SMA30 crossover over equities.

use chrono::NaiveDate;
use log::debug;

use super::{Rebalance, Strategy, check_threshold, settle, universe};
use crate::error::StrategyError;
use crate::history::ReturnSeriesStore;
use crate::score::crossover_signal;
use crate::types::{Action, Allocation, Category, PortfolioState, RiskProfile};

pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Equal weight across every equity with a buy signal; sell signals go to
/// zero. Equities without enough history keep their current weight, and
/// the buys share what is left.
#[derive(Clone, Debug)]
pub struct CrossoverMomentum {
    pub threshold: f64,
}

impl Default for CrossoverMomentum {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossoverMomentum {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Strategy for CrossoverMomentum {
    fn risk_profile(&self) -> RiskProfile {
        RiskProfile::EquityMomentum
    }

    fn name(&self) -> &'static str {
        "crossover"
    }

    fn run(
        &mut self,
        date: NaiveDate,
        state: &PortfolioState,
        history: &dyn ReturnSeriesStore,
    ) -> Result<Rebalance, StrategyError> {
        let threshold = check_threshold(self.threshold)?;

        let tickers = universe(history, Some(Category::Equity), date);
        if tickers.is_empty() {
            return Err(StrategyError::EmptyUniverse(date));
        }

        let mut buys: Vec<&str> = Vec::new();
        let mut target = Allocation::new();
        for ticker in tickers {
            match crossover_signal(history.observations_for(ticker, date)) {
                Some(Action::Buy) => buys.push(ticker),
                Some(Action::Sell) => {}
                None => {
                    debug!("{} {date}: {ticker} lacks history, weight kept", self.name());
                    let held = state.holdings.get(ticker);
                    if held > 0.0 {
                        target.set(ticker, held);
                    }
                }
            }
        }

        if !buys.is_empty() {
            let each = (1.0 - target.total()).max(0.0) / buys.len() as f64;
            for ticker in buys {
                target.set(ticker, each);
            }
        }

        Ok(settle(self.name(), date, target, &state.holdings, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use crate::history::fixtures::{day, series};

    fn store() -> MemoryStore {
        let up: Vec<f64> = (0..40).map(|i| 100.0 + (i * i) as f64).collect();
        let down: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let mut data = series("UP1", Category::Equity, &up);
        data.extend(series("UP2", Category::Equity, &up));
        data.extend(series("DOWN", Category::Equity, &down));
        data.extend(series("NEW", Category::Equity, &up[..5]));
        data.extend(series("ETF", Category::Etf, &up));
        MemoryStore::from_observations(data)
    }

    #[test]
    fn equal_weight_across_buys() {
        let holdings: Allocation = [("DOWN", 0.5), ("NEW", 0.2)].into_iter().collect();
        let state = PortfolioState::new(6, RiskProfile::EquityMomentum, holdings);
        let rebalance = CrossoverMomentum::new().run(day(40), &state, &store()).unwrap();

        let t = &rebalance.target;
        assert_eq!(t.get("DOWN"), 0.0);
        assert_eq!(t.get("NEW"), 0.2);
        assert!((t.get("UP1") - 0.4).abs() < 1e-12);
        assert!((t.get("UP2") - 0.4).abs() < 1e-12);
        assert!(!t.contains("ETF"));

        let assets: Vec<&str> = rebalance.orders.iter().map(|o| o.asset.as_str()).collect();
        assert_eq!(assets, vec!["DOWN", "UP1", "UP2"]);
    }

    #[test]
    fn all_sells_go_to_cash() {
        let down: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let store = MemoryStore::from_observations(series("DOWN", Category::Equity, &down));
        let holdings: Allocation = [("DOWN", 1.0)].into_iter().collect();
        let state = PortfolioState::new(6, RiskProfile::EquityMomentum, holdings);
        let rebalance = CrossoverMomentum::new().run(day(40), &state, &store).unwrap();

        assert!(rebalance.target.is_empty());
        assert_eq!(rebalance.orders.len(), 1);
        assert_eq!(rebalance.orders[0].action, Action::Sell);
    }
}
