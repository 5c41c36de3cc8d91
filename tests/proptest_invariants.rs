//! Property-based tests for weight and order invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated allocations.

use folio::diff::OrderGenerator;
use folio::optimize::normalize_long_only;
use folio::{Action, Allocation};
use proptest::prelude::*;

const TICKERS: [&str; 6] = ["AAPL", "GLD", "MSFT", "SPY", "TLT", "XOM"];

/// Raw optimizer output: arbitrary values, including negatives.
fn raw_weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0f64..2.0, 1..12)
}

/// A valid allocation over a subset of `TICKERS` with total ≤ 1.
fn allocation() -> impl Strategy<Value = Allocation> {
    prop::collection::vec(0.0f64..1.0, TICKERS.len()).prop_map(|raw| {
        let total: f64 = raw.iter().sum::<f64>().max(1.0);
        TICKERS
            .iter()
            .zip(raw)
            .filter(|(_, w)| *w > 0.05)
            .map(|(t, w)| (*t, w / total))
            .collect()
    })
}

fn apply(current: &Allocation, orders: &[folio::diff::RebalanceOrder]) -> Allocation {
    let mut next = current.clone();
    for order in orders {
        let signed = match order.action {
            Action::Buy => order.quantity,
            Action::Sell => -order.quantity,
        };
        next.set(order.asset.as_str(), next.get(&order.asset) + signed);
    }
    next
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Normalized weights are in [0, 1] and sum to one.
    #[test]
    fn normalized_weights_form_simplex(raw in raw_weights()) {
        let w = normalize_long_only(raw);
        prop_assert!(w.iter().all(|x| (0.0..=1.0).contains(x)));
        prop_assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    /// Applying the orders lands every asset within threshold of its target.
    #[test]
    fn orders_reach_target(
        target in allocation(),
        current in allocation(),
        threshold in 0.0f64..0.05,
    ) {
        let generator = OrderGenerator::new(threshold);
        let orders = generator.generate(&target, &current);
        let next = apply(&current, &orders);
        for ticker in TICKERS {
            prop_assert!((next.get(ticker) - target.get(ticker)).abs() <= threshold + 1e-12);
        }
        prop_assert!(orders.iter().all(|o| o.quantity > threshold));
        prop_assert!(orders.windows(2).all(|p| p[0].asset < p[1].asset));
    }

    /// Once the target is adopted, the same target yields no orders.
    #[test]
    fn rebalancing_is_idempotent(target in allocation(), current in allocation()) {
        let generator = OrderGenerator::new(1e-6);
        let _ = generator.generate(&target, &current);
        prop_assert!(generator.generate(&target, &target).is_empty());
    }

    /// Clamping always yields weights in [0, 1].
    #[test]
    fn clamp_bounds_weights(raw in prop::collection::vec(-3.0f64..3.0, 1..6)) {
        let mut alloc: Allocation = TICKERS.iter().zip(raw).map(|(t, w)| (*t, w)).collect();
        alloc.clamp_unit();
        prop_assert!(alloc.iter().all(|(_, w)| (0.0..=1.0).contains(&w)));
    }
}
