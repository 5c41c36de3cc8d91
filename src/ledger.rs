//! Durable store for orders and holdings snapshots.
//!
//! A rebalance date is written as one [`LedgerBatch`]: the orders of that
//! date plus the portfolio's complete holdings snapshot after them. Batches
//! are staged through a [`Transaction`] and land all at once on
//! [`Transaction::commit`], or not at all.
//!
//! ```
//! use chrono::NaiveDate;
//! use folio::ledger::{Ledger, MemoryLedger, Transaction};
//! use folio::Holding;
//!
//! let date = NaiveDate::from_ymd_opt(2023, 3, 6).unwrap();
//! let mut ledger = MemoryLedger::new();
//!
//! let mut tx = Transaction::begin(&mut ledger, 1, date);
//! tx.append_holdings([Holding { portfolio_id: 1, ticker: "AAPL".into(), weight: 0.5, as_of: date }]);
//! tx.commit().unwrap();
//!
//! assert_eq!(ledger.latest_holdings(1).unwrap().unwrap().len(), 1);
//! ```

use chrono::NaiveDate;

use crate::error::{ConstraintViolation, LedgerError};
use crate::types::{Holding, Order, WEIGHT_EPSILON};

/// Everything written for one portfolio on one date.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerBatch {
    pub portfolio_id: u32,
    pub date: NaiveDate,
    pub orders: Vec<Order>,
    /// Full snapshot after the orders; an empty snapshot means all cash.
    pub holdings: Vec<Holding>,
}

impl LedgerBatch {
    pub fn new(portfolio_id: u32, date: NaiveDate) -> Self {
        Self {
            portfolio_id,
            date,
            orders: Vec::new(),
            holdings: Vec::new(),
        }
    }

    /// Check every record-level constraint.
    pub fn validate(&self) -> Result<(), ConstraintViolation> {
        for order in &self.orders {
            if order.portfolio_id != self.portfolio_id {
                return Err(ConstraintViolation::PortfolioMismatch {
                    expected: self.portfolio_id,
                    found: order.portfolio_id,
                });
            }
            if order.asset.trim().is_empty() {
                return Err(ConstraintViolation::EmptyAsset);
            }
            if !order.quantity.is_finite() || order.quantity < 0.0 {
                return Err(ConstraintViolation::NegativeQuantity {
                    asset: order.asset.clone(),
                    quantity: order.quantity,
                });
            }
        }

        let mut total = 0.0;
        for holding in &self.holdings {
            if holding.portfolio_id != self.portfolio_id {
                return Err(ConstraintViolation::PortfolioMismatch {
                    expected: self.portfolio_id,
                    found: holding.portfolio_id,
                });
            }
            if holding.ticker.trim().is_empty() {
                return Err(ConstraintViolation::EmptyAsset);
            }
            if !(0.0..=1.0).contains(&holding.weight) {
                return Err(ConstraintViolation::WeightOutOfRange {
                    ticker: holding.ticker.clone(),
                    weight: holding.weight,
                });
            }
            total += holding.weight;
        }
        if total > 1.0 + WEIGHT_EPSILON {
            return Err(ConstraintViolation::OverAllocated {
                portfolio_id: self.portfolio_id,
                total,
            });
        }
        Ok(())
    }
}

/// Storage backend for committed batches.
pub trait Ledger {
    /// Persist one validated batch atomically.
    fn write_batch(&mut self, batch: LedgerBatch) -> Result<(), LedgerError>;

    /// Every committed batch of `portfolio_id`, oldest first.
    fn batches_for(&self, portfolio_id: u32) -> Result<Vec<LedgerBatch>, LedgerError>;

    /// Most recent batch of `portfolio_id`.
    fn latest_batch(&self, portfolio_id: u32) -> Result<Option<LedgerBatch>, LedgerError> {
        Ok(self.batches_for(portfolio_id)?.pop())
    }

    /// Holdings snapshot of the most recent batch for `portfolio_id`, or
    /// `None` if nothing was ever committed for it.
    fn latest_holdings(&self, portfolio_id: u32) -> Result<Option<Vec<Holding>>, LedgerError> {
        Ok(self.latest_batch(portfolio_id)?.map(|b| b.holdings))
    }

    /// Every committed order of `portfolio_id`, oldest first.
    fn orders(&self, portfolio_id: u32) -> Result<Vec<Order>, LedgerError> {
        Ok(self
            .batches_for(portfolio_id)?
            .into_iter()
            .flat_map(|b| b.orders)
            .collect())
    }
}

/// Staged writes for one portfolio and date.
///
/// Dropping a transaction without calling [`commit`](Self::commit)
/// discards everything staged in it.
pub struct Transaction<'a> {
    ledger: &'a mut dyn Ledger,
    batch: LedgerBatch,
}

impl<'a> Transaction<'a> {
    pub fn begin(ledger: &'a mut dyn Ledger, portfolio_id: u32, date: NaiveDate) -> Self {
        Self {
            ledger,
            batch: LedgerBatch::new(portfolio_id, date),
        }
    }

    pub fn append_orders(&mut self, orders: impl IntoIterator<Item = Order>) {
        self.batch.orders.extend(orders);
    }

    pub fn append_holdings(&mut self, holdings: impl IntoIterator<Item = Holding>) {
        self.batch.holdings.extend(holdings);
    }

    pub fn staged(&self) -> &LedgerBatch {
        &self.batch
    }

    /// Validate and write the staged batch.
    pub fn commit(self) -> Result<(), LedgerError> {
        self.batch.validate()?;
        self.ledger.write_batch(self.batch)
    }
}

/// Ledger kept in memory; used for dry runs and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    batches: Vec<LedgerBatch>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[LedgerBatch] {
        &self.batches
    }
}

impl Ledger for MemoryLedger {
    fn write_batch(&mut self, batch: LedgerBatch) -> Result<(), LedgerError> {
        self.batches.push(batch);
        Ok(())
    }

    fn batches_for(&self, portfolio_id: u32) -> Result<Vec<LedgerBatch>, LedgerError> {
        Ok(self
            .batches
            .iter()
            .filter(|b| b.portfolio_id == portfolio_id)
            .cloned()
            .collect())
    }
}
