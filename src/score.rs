//! Per-asset signal scoring.
//!
//! Every function here takes the history of one asset already truncated
//! strictly before the evaluation date and returns `None` when that history
//! is too short. An undefined score excludes the asset for that date; it is
//! never treated as zero.

use chrono::NaiveDate;

use crate::indicators::{last_sma, mean, trailing_std};
use crate::types::{Action, AssetObservation};

/// Long moving-average window shared by the distance and crossover signals.
pub const SMA_LONG: usize = 30;
/// Short moving-average window of the crossover signal.
pub const SMA_SHORT: usize = 10;
/// Trailing window (trading days) for return volatility.
pub const VOLATILITY_WINDOW: usize = 252;
/// Weight of volatility in the momentum-distance score.
pub const VOLATILITY_PENALTY: f64 = 0.5;
/// Trailing window (observations) for the mean-return score.
pub const MEAN_RETURN_WINDOW: usize = 90;

/// Scored asset on one evaluation date.
#[derive(Clone, Debug, PartialEq)]
pub struct Score {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub magnitude: f64,
    /// +1 when price sits above its long average, −1 otherwise.
    pub direction: i8,
}

impl Score {
    pub fn action(&self) -> Action {
        Action::from_direction(self.direction)
    }
}

fn prices(history: &[AssetObservation]) -> Vec<f64> {
    history.iter().map(|o| o.price).collect()
}

fn returns(history: &[AssetObservation]) -> Vec<f64> {
    history
        .iter()
        .map(|o| o.ret)
        .filter(|r| r.is_finite())
        .collect()
}

/// Momentum-distance score used by the ranking strategy.
///
/// `|(price − SMA30) / SMA30| − 0.5 × σ`, where σ is the sample standard
/// deviation of the trailing 252 returns. The sign of the distance gives the
/// direction.
pub fn momentum_distance(
    ticker: &str,
    as_of: NaiveDate,
    history: &[AssetObservation],
) -> Option<Score> {
    if history.len() < SMA_LONG {
        return None;
    }
    let prices = prices(history);
    let sma = last_sma(&prices, SMA_LONG)?;
    let last = *prices.last()?;
    if sma == 0.0 || !last.is_finite() {
        return None;
    }
    let distance = (last - sma) / sma;
    let volatility = trailing_std(&returns(history), VOLATILITY_WINDOW).unwrap_or(0.0);

    let magnitude = distance.abs() - VOLATILITY_PENALTY * volatility;
    if !magnitude.is_finite() {
        return None;
    }
    Some(Score {
        ticker: ticker.to_string(),
        as_of,
        magnitude,
        direction: if distance > 0.0 { 1 } else { -1 },
    })
}

/// SMA10/SMA30 crossover signal: buy when the short average is above the long one.
pub fn crossover_signal(history: &[AssetObservation]) -> Option<Action> {
    if history.len() < SMA_LONG {
        return None;
    }
    let prices = prices(history);
    let short = last_sma(&prices, SMA_SHORT)?;
    let long = last_sma(&prices, SMA_LONG)?;
    Some(if short > long { Action::Buy } else { Action::Sell })
}

/// Mean of the last `window` returns; 0.0 when there are none.
pub fn trailing_mean_return(history: &[AssetObservation], window: usize) -> f64 {
    let start = history.len().saturating_sub(window);
    mean(&returns(&history[start..])).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::fixtures::{day, series};
    use crate::types::Category;

    fn rising_then_accelerating() -> Vec<AssetObservation> {
        let prices: Vec<f64> = (0..40)
            .map(|i| if i < 30 { 100.0 + i as f64 } else { 130.0 + 5.0 * (i - 29) as f64 })
            .collect();
        series("UP", Category::Equity, &prices)
    }

    #[test]
    fn crossover_buy_on_uptrend() {
        assert_eq!(crossover_signal(&rising_then_accelerating()), Some(Action::Buy));
    }

    #[test]
    fn crossover_sell_on_monotone_decline() {
        let prices: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let history = series("DOWN", Category::Equity, &prices);
        assert_eq!(crossover_signal(&history), Some(Action::Sell));
    }

    #[test]
    fn crossover_undefined_below_thirty() {
        let prices: Vec<f64> = (0..29).map(|i| 100.0 + i as f64).collect();
        let history = series("SHORT", Category::Equity, &prices);
        assert_eq!(crossover_signal(&history), None);
    }

    #[test]
    fn distance_undefined_below_thirty() {
        let prices = vec![100.0; 29];
        let history = series("X", Category::Equity, &prices);
        assert!(momentum_distance("X", day(40), &history).is_none());
    }

    #[test]
    fn distance_flat_series_is_zero() {
        let history = series("FLAT", Category::Equity, &[50.0; 40]);
        let score = momentum_distance("FLAT", day(40), &history).unwrap();
        assert_eq!(score.magnitude, 0.0);
        assert_eq!(score.direction, -1);
        assert_eq!(score.action(), Action::Sell);
    }

    #[test]
    fn distance_direction_follows_price() {
        let history = rising_then_accelerating();
        let score = momentum_distance("UP", day(40), &history).unwrap();
        assert_eq!(score.direction, 1);
        assert_eq!(score.ticker, "UP");
        assert_eq!(score.as_of, day(40));

        // |distance| minus half the volatility of returns
        let prices: Vec<f64> = history.iter().map(|o| o.price).collect();
        let sma = prices[10..].iter().sum::<f64>() / 30.0;
        let distance = (prices[39] - sma) / sma;
        let rets: Vec<f64> = history.iter().map(|o| o.ret).collect();
        let vol = crate::indicators::sample_std(&rets).unwrap();
        assert!((score.magnitude - (distance - 0.5 * vol)).abs() < 1e-12);
    }

    #[test]
    fn distance_rejects_zero_average() {
        let history = series("ZERO", Category::Equity, &[0.0; 30]);
        assert!(momentum_distance("ZERO", day(30), &history).is_none());
    }

    #[test]
    fn trailing_mean_uses_last_window() {
        let mut history = series("A", Category::Equity, &[1.0; 5]);
        for (i, o) in history.iter_mut().enumerate() {
            o.ret = i as f64;
        }
        // last three returns: 2, 3, 4
        assert_eq!(trailing_mean_return(&history, 3), 3.0);
        assert_eq!(trailing_mean_return(&history, 100), 2.0);
    }

    #[test]
    fn trailing_mean_empty_is_zero() {
        assert_eq!(trailing_mean_return(&[], MEAN_RETURN_WINDOW), 0.0);
    }
}
