//! Weekly rebalancing loop for one portfolio.
//!
//! For every scheduled date that is a trading day, the engine asks the
//! strategy for a rebalance, writes the resulting orders and the new
//! holdings snapshot to the ledger as one transaction, and only then adopts
//! the target as the portfolio's current holdings. A ledger failure stops
//! the run at that date.
//!
//! A resumed run walks the same schedule: dates up to the last committed
//! batch are handed to [`Strategy::replay`] so stateful strategies end up
//! where an uninterrupted run would have left them.

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};

use crate::diff::{OrderContext, to_orders};
use crate::error::{Error, Result, StrategyError};
use crate::history::ReturnSeriesStore;
use crate::ledger::{Ledger, Transaction};
use crate::strategy::Strategy;
use crate::types::{Allocation, PortfolioState};

pub const DEFAULT_STEP_DAYS: i64 = 7;

/// Evaluation dates from `start` to `end` inclusive, `step_days` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub step_days: i64,
}

impl Schedule {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::with_step(start, end, DEFAULT_STEP_DAYS)
    }

    pub fn with_step(start: NaiveDate, end: NaiveDate, step_days: i64) -> Result<Self> {
        if start > end || step_days < 1 {
            return Err(Error::Schedule { start, end });
        }
        Ok(Self {
            start,
            end,
            step_days,
        })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let step = Duration::days(self.step_days);
        std::iter::successors(Some(self.start), move |d| Some(*d + step))
            .take_while(move |d| *d <= self.end)
    }
}

/// Outcome of one portfolio run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub portfolio_id: u32,
    /// Dates on which the strategy produced a rebalance.
    pub dates_evaluated: usize,
    /// Dates at or before the resume point, replayed without trading.
    pub dates_replayed: usize,
    /// Non-trading days and dates without a usable universe.
    pub dates_skipped: usize,
    /// Dates whose batch was committed.
    pub dates_committed: usize,
    pub orders_written: usize,
    pub final_holdings: Allocation,
}

/// Drives a strategy over a [`Schedule`].
#[derive(Clone, Copy, Debug)]
pub struct Engine {
    schedule: Schedule,
    replay_through: Option<NaiveDate>,
}

impl Engine {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            replay_through: None,
        }
    }

    /// Treat scheduled dates up to and including `last_committed` as already
    /// done: the strategy replays them to rebuild its state, nothing is
    /// evaluated or written for them.
    pub fn resuming_after(mut self, last_committed: NaiveDate) -> Self {
        self.replay_through = Some(last_committed);
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run `strategy` for `portfolio` across the schedule.
    ///
    /// # Errors
    ///
    /// - [`Error::Persistence`] when a commit fails; nothing of that date is
    ///   written and later dates are not evaluated.
    /// - [`Error::Strategy`] for invalid strategy parameters.
    pub fn run(
        &self,
        portfolio: PortfolioState,
        strategy: &mut dyn Strategy,
        store: &dyn ReturnSeriesStore,
        ledger: &mut dyn Ledger,
    ) -> Result<RunSummary> {
        let mut state = portfolio;
        let mut summary = RunSummary {
            portfolio_id: state.portfolio_id,
            dates_evaluated: 0,
            dates_replayed: 0,
            dates_skipped: 0,
            dates_committed: 0,
            orders_written: 0,
            final_holdings: Allocation::new(),
        };

        if strategy.risk_profile() != state.risk_profile {
            warn!(
                "portfolio {} is {} but {} trades for {}; orders carry the strategy's profile",
                state.portfolio_id,
                state.risk_profile,
                strategy.name(),
                strategy.risk_profile()
            );
        }

        strategy.prepare(self.schedule.start, self.schedule.step_days, store);

        for date in self.schedule.dates() {
            let trading = store.is_trading_day(date);
            if self.replay_through.is_some_and(|last| date <= last) {
                if trading {
                    strategy.replay(date, store);
                    summary.dates_replayed += 1;
                }
                continue;
            }
            if !trading {
                debug!("portfolio {} {date}: not a trading day", state.portfolio_id);
                summary.dates_skipped += 1;
                continue;
            }

            let rebalance = match strategy.run(date, &state, store) {
                Ok(r) => r,
                Err(StrategyError::EmptyUniverse(_)) => {
                    debug!(
                        "portfolio {} {date}: no asset has usable history",
                        state.portfolio_id
                    );
                    summary.dates_skipped += 1;
                    continue;
                }
                Err(source) => return Err(Error::Strategy { date, source }),
            };
            summary.dates_evaluated += 1;

            if rebalance.orders.is_empty() {
                continue;
            }

            let ctx = OrderContext {
                date,
                portfolio_id: state.portfolio_id,
                risk_profile: strategy.risk_profile(),
            };
            let orders = to_orders(rebalance.orders, &ctx, store);
            let n_orders = orders.len();

            let mut tx = Transaction::begin(&mut *ledger, state.portfolio_id, date);
            tx.append_orders(orders);
            tx.append_holdings(rebalance.target.to_holdings(state.portfolio_id, date));
            tx.commit()
                .map_err(|source| Error::Persistence { date, source })?;

            info!(
                "portfolio {} {date}: committed {n_orders} orders ({})",
                state.portfolio_id,
                strategy.name()
            );
            summary.dates_committed += 1;
            summary.orders_written += n_orders;
            state.holdings = rebalance.target;
        }

        summary.final_holdings = state.holdings;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::OrderGenerator;
    use crate::error::LedgerError;
    use crate::history::MemoryStore;
    use crate::history::fixtures::{day, obs};
    use crate::ledger::{LedgerBatch, MemoryLedger};
    use crate::strategy::{Rebalance, settle};
    use crate::types::RiskProfile;

    /// Alternates between two fixed targets and counts its calls.
    #[derive(Default)]
    struct Flip {
        calls: usize,
        replays: Vec<NaiveDate>,
    }

    impl Strategy for Flip {
        fn risk_profile(&self) -> RiskProfile {
            RiskProfile::LowRisk
        }

        fn name(&self) -> &'static str {
            "flip"
        }

        fn replay(&mut self, date: NaiveDate, _history: &dyn ReturnSeriesStore) {
            self.replays.push(date);
        }

        fn run(
            &mut self,
            date: NaiveDate,
            state: &PortfolioState,
            _history: &dyn ReturnSeriesStore,
        ) -> std::result::Result<Rebalance, StrategyError> {
            self.calls += 1;
            let target: Allocation = if self.calls % 2 == 1 {
                [("A", 0.7), ("B", 0.3)].into_iter().collect()
            } else {
                [("A", 0.3), ("B", 0.7)].into_iter().collect()
            };
            Ok(settle("flip", date, target, &state.holdings, 1e-6))
        }
    }

    /// Accepts `ok` batches, then fails every write.
    struct FailingLedger {
        inner: MemoryLedger,
        ok: usize,
    }

    impl Ledger for FailingLedger {
        fn write_batch(&mut self, batch: LedgerBatch) -> std::result::Result<(), LedgerError> {
            if self.inner.batches().len() >= self.ok {
                return Err(LedgerError::Unavailable("disk full".into()));
            }
            self.inner.write_batch(batch)
        }

        fn batches_for(
            &self,
            portfolio_id: u32,
        ) -> std::result::Result<Vec<LedgerBatch>, LedgerError> {
            self.inner.batches_for(portfolio_id)
        }
    }

    /// Daily observations for 35 days.
    fn store() -> MemoryStore {
        MemoryStore::from_observations((0..35).map(|d| obs("A", d, 1.0, 0.0)))
    }

    fn portfolio() -> PortfolioState {
        PortfolioState::new(9, RiskProfile::LowRisk, Allocation::new())
    }

    #[test]
    fn schedule_steps_weekly_inclusive() {
        let schedule = Schedule::new(day(0), day(14)).unwrap();
        let dates: Vec<_> = schedule.dates().collect();
        assert_eq!(dates, vec![day(0), day(7), day(14)]);
        assert!(Schedule::new(day(1), day(0)).is_err());
        assert!(Schedule::with_step(day(0), day(1), 0).is_err());
    }

    #[test]
    fn commits_every_trading_date() {
        let engine = Engine::new(Schedule::new(day(0), day(28)).unwrap());
        let mut strategy = Flip::default();
        let mut ledger = MemoryLedger::new();
        let summary = engine
            .run(portfolio(), &mut strategy, &store(), &mut ledger)
            .unwrap();

        assert_eq!(summary.dates_evaluated, 5);
        assert_eq!(summary.dates_committed, 5);
        assert_eq!(summary.orders_written, 10);
        assert_eq!(ledger.batches().len(), 5);
        assert!((summary.final_holdings.get("A") - 0.7).abs() < 1e-12);

        let last = ledger.latest_holdings(9).unwrap().unwrap();
        assert_eq!(Allocation::from_holdings(&last), summary.final_holdings);
        let orders = ledger.orders(9).unwrap();
        assert!(orders.iter().filter(|o| o.asset == "A").all(|o| o.sector == "Technology"));
        // B never appears in the store
        assert!(orders.iter().filter(|o| o.asset == "B").all(|o| o.sector == "Unknown"));
    }

    #[test]
    fn non_trading_days_are_skipped() {
        // the store ends at day(34); day(35) and day(42) are not trading days
        let engine = Engine::new(Schedule::new(day(28), day(42)).unwrap());
        let mut strategy = Flip::default();
        let mut ledger = MemoryLedger::new();
        let summary = engine
            .run(portfolio(), &mut strategy, &store(), &mut ledger)
            .unwrap();
        assert_eq!(summary.dates_evaluated, 1);
        assert_eq!(summary.dates_skipped, 2);
        assert_eq!(strategy.calls, 1);
    }

    #[test]
    fn resumed_run_replays_committed_dates() {
        let engine = Engine::new(Schedule::new(day(0), day(28)).unwrap()).resuming_after(day(14));
        let mut strategy = Flip::default();
        let mut ledger = MemoryLedger::new();
        let summary = engine
            .run(portfolio(), &mut strategy, &store(), &mut ledger)
            .unwrap();

        assert_eq!(strategy.replays, vec![day(0), day(7), day(14)]);
        assert_eq!(strategy.calls, 2);
        assert_eq!(summary.dates_replayed, 3);
        assert_eq!(summary.dates_evaluated, 2);
        let dates: Vec<_> = ledger.batches().iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![day(21), day(28)]);
    }

    #[test]
    fn orders_carry_the_strategy_profile() {
        let engine = Engine::new(Schedule::new(day(0), day(0)).unwrap());
        let state = PortfolioState::new(9, RiskProfile::EquityMomentum, Allocation::new());
        let mut ledger = MemoryLedger::new();
        engine
            .run(state, &mut Flip::default(), &store(), &mut ledger)
            .unwrap();

        let orders = ledger.orders(9).unwrap();
        assert!(!orders.is_empty());
        assert!(orders.iter().all(|o| o.risk_profile == RiskProfile::LowRisk));
    }

    #[test]
    fn persistence_failure_stops_the_run() {
        let engine = Engine::new(Schedule::new(day(0), day(28)).unwrap());
        let mut strategy = Flip::default();
        let mut ledger = FailingLedger {
            inner: MemoryLedger::new(),
            ok: 2,
        };
        let err = engine
            .run(portfolio(), &mut strategy, &store(), &mut ledger)
            .unwrap_err();

        match err {
            Error::Persistence { date, .. } => assert_eq!(date, day(14)),
            other => panic!("unexpected error: {other}"),
        }
        // the failed date left nothing behind and later dates never ran
        assert_eq!(ledger.inner.batches().len(), 2);
        assert_eq!(strategy.calls, 3);
    }

    #[test]
    fn constraint_violation_surfaces_as_persistence_error() {
        struct Overweight;
        impl Strategy for Overweight {
            fn risk_profile(&self) -> RiskProfile {
                RiskProfile::LowRisk
            }
            fn name(&self) -> &'static str {
                "overweight"
            }
            fn run(
                &mut self,
                _date: NaiveDate,
                _state: &PortfolioState,
                _history: &dyn ReturnSeriesStore,
            ) -> std::result::Result<Rebalance, StrategyError> {
                let target: Allocation = [("A", 0.8), ("B", 0.8)].into_iter().collect();
                let orders = OrderGenerator::new(0.0).generate(&target, &Allocation::new());
                Ok(Rebalance { target, orders })
            }
        }

        let engine = Engine::new(Schedule::new(day(0), day(7)).unwrap());
        let mut ledger = MemoryLedger::new();
        let err = engine
            .run(portfolio(), &mut Overweight, &store(), &mut ledger)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Persistence {
                source: LedgerError::Constraint(_),
                ..
            }
        ));
        assert!(ledger.batches().is_empty());
    }
}
