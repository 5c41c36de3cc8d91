//! Target → current diff engine.
//!
//! Computes the orders needed to move a portfolio from its current weights
//! to a target allocation. Differences at or below the threshold are
//! ignored, so the same target applied twice yields no orders.

use chrono::NaiveDate;

use crate::history::ReturnSeriesStore;
use crate::types::{Action, Allocation, Order, RiskProfile};

/// Sector recorded on orders for assets the store knows nothing about.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// A single rebalance order (computed diff), before it is tied to a date
/// and portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOrder {
    pub asset: String,
    pub action: Action,
    /// Fraction of portfolio value, always positive.
    pub quantity: f64,
}

/// Threshold-based order generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderGenerator {
    threshold: f64,
}

impl OrderGenerator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Orders moving `current` to `target`, ordered by ticker.
    ///
    /// Assets present in only one of the two maps count as weight zero in
    /// the other.
    pub fn generate(&self, target: &Allocation, current: &Allocation) -> Vec<RebalanceOrder> {
        let mut assets: Vec<&str> = target.tickers().chain(current.tickers()).collect();
        assets.sort_unstable();
        assets.dedup();

        assets
            .into_iter()
            .filter_map(|asset| {
                let diff = target.get(asset) - current.get(asset);
                if !diff.is_finite() || diff.abs() <= self.threshold {
                    return None;
                }
                Some(RebalanceOrder {
                    asset: asset.to_string(),
                    action: if diff > 0.0 { Action::Buy } else { Action::Sell },
                    quantity: diff.abs(),
                })
            })
            .collect()
    }
}

/// Who and when an order batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderContext {
    pub date: NaiveDate,
    pub portfolio_id: u32,
    pub risk_profile: RiskProfile,
}

impl RebalanceOrder {
    pub fn into_order(self, ctx: &OrderContext, sector: &str) -> Order {
        Order {
            date: ctx.date,
            portfolio_id: ctx.portfolio_id,
            risk_profile: ctx.risk_profile,
            action: self.action,
            asset: self.asset,
            quantity: self.quantity,
            sector: sector.to_string(),
        }
    }
}

/// Attach date, portfolio and each asset's latest sector.
pub fn to_orders(
    orders: Vec<RebalanceOrder>,
    ctx: &OrderContext,
    history: &dyn ReturnSeriesStore,
) -> Vec<Order> {
    orders
        .into_iter()
        .map(|o| {
            let sector = history
                .sector_of(&o.asset)
                .unwrap_or(UNKNOWN_SECTOR)
                .to_string();
            o.into_order(ctx, &sector)
        })
        .collect()
}
