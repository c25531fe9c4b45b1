//! Slippage estimate from a median regression of bid price on depth.

use tracing::{debug, warn};

use super::cache::{levels_key, LevelsKey, LruStore, MemoStore};
use super::estimator::{MedianRegression, ModelError, Regressor};
use super::ModelStats;
use crate::book::OrderBookSnapshot;

/// Scale applied to the volume-share fallback.
const FALLBACK_SCALE: f64 = 0.1;

/// Fits `price ~ volume` over the bid side and evaluates the fit at the
/// configured order size. Slippage is the relative distance between that
/// predicted price and the best bid.
#[derive(Debug)]
pub struct SlippageModel<S = LruStore<LevelsKey, f64>, R = MedianRegression> {
    volatility: f64,
    order_size: f64,
    last_slippage: Option<f64>,
    cache: S,
    regressor: R,
    stats: ModelStats,
}

impl SlippageModel {
    pub fn new(volatility: f64, order_size: f64, cache_capacity: usize) -> Self {
        Self::with_parts(
            volatility,
            order_size,
            LruStore::new(cache_capacity),
            MedianRegression::default(),
        )
    }
}

impl<S, R> SlippageModel<S, R>
where
    S: MemoStore<LevelsKey, f64>,
    R: Regressor,
{
    pub fn with_parts(volatility: f64, order_size: f64, cache: S, regressor: R) -> Self {
        debug!(volatility, order_size, "slippage_model_initialized");
        Self {
            volatility,
            order_size,
            last_slippage: None,
            cache,
            regressor,
            stats: ModelStats::default(),
        }
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    pub fn order_size(&self) -> f64 {
        self.order_size
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }

    pub fn last_slippage(&self) -> Option<f64> {
        self.last_slippage
    }

    /// Expected slippage as a fraction of the best bid. Never fails.
    pub fn estimate(&mut self, book: &OrderBookSnapshot) -> f64 {
        let bids = book.bids();
        if bids.is_empty() {
            self.stats.failures += 1;
            return self.last_slippage.unwrap_or(0.0);
        }

        let Self {
            volatility,
            order_size,
            cache,
            regressor,
            stats,
            ..
        } = self;

        let mut computed = false;
        let result = cache.get_or_try_insert_with(levels_key(bids), || {
            computed = true;
            compute_slippage(book, regressor, *volatility, *order_size, stats)
        });
        if !computed {
            stats.cache_hits += 1;
        }

        match result {
            Ok(slippage) => {
                self.last_slippage = Some(slippage);
                slippage
            }
            Err(e) => {
                self.stats.failures += 1;
                warn!(error = %e, "slippage_estimate_failed, using last good value");
                self.last_slippage.unwrap_or(0.0)
            }
        }
    }
}

fn compute_slippage<R: Regressor>(
    book: &OrderBookSnapshot,
    regressor: &mut R,
    volatility: f64,
    order_size: f64,
    stats: &mut ModelStats,
) -> Result<f64, ModelError> {
    let bids = book.bids();
    let best_bid = book.best_bid().ok_or(ModelError::InsufficientData {
        needed: 1,
        got: 0,
    })?;

    let volumes: Vec<f64> = bids.iter().map(|l| l.volume).collect();
    let prices: Vec<f64> = bids.iter().map(|l| l.price).collect();

    let fitted = regressor
        .fit(&volumes, &prices)
        .and_then(|_| regressor.predict(order_size))
        .map(|predicted| (predicted - best_bid).abs() / best_bid)
        .and_then(|s| if s.is_finite() { Ok(s) } else { Err(ModelError::NonFinite) });

    match fitted {
        Ok(slippage) => {
            stats.fits += 1;
            Ok(slippage)
        }
        Err(e) => {
            debug!(error = %e, "quantile regression unavailable, using volume-share fallback");
            stats.fallbacks += 1;
            volume_share_fallback(volatility, order_size, book.total_bid_volume())
        }
    }
}

/// `volatility · (order_size / total_bid_volume) · 0.1`
fn volume_share_fallback(
    volatility: f64,
    order_size: f64,
    total_bid_volume: f64,
) -> Result<f64, ModelError> {
    if total_bid_volume <= 0.0 {
        return Err(ModelError::InsufficientData { needed: 1, got: 0 });
    }
    let slippage = volatility * (order_size / total_bid_volume) * FALLBACK_SCALE;
    if slippage.is_finite() && slippage >= 0.0 {
        Ok(slippage)
    } else {
        Err(ModelError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PriceLevel;

    fn book(bids: &[(f64, f64)]) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            bids.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect(),
            vec![PriceLevel::new(101.0, 1.0)],
        )
    }

    #[test]
    fn test_regression_slippage() {
        // price = 100 - 0.01 * volume, so at volume 100 the fit predicts 99
        let b = book(&[(99.99, 1.0), (99.98, 2.0), (99.97, 3.0), (99.96, 4.0)]);
        let mut model = SlippageModel::new(0.02, 100.0, 32);

        let slippage = model.estimate(&b);
        let expected = (99.0_f64 - 99.99).abs() / 99.99;
        assert!((slippage - expected).abs() < 1e-4, "slippage={}", slippage);
        assert_eq!(model.stats().fits, 1);
        assert_eq!(model.stats().fallbacks, 0);
    }

    #[test]
    fn test_single_distinct_volume_uses_fallback() {
        let b = book(&[(100.0, 2.0), (99.0, 2.0)]);
        let mut model = SlippageModel::new(0.02, 100.0, 32);

        let slippage = model.estimate(&b);
        let expected = 0.02 * (100.0 / 4.0) * 0.1;
        assert!((slippage - expected).abs() < 1e-12);
        assert_eq!(model.stats().fallbacks, 1);
        assert_eq!(model.stats().fits, 0);
    }

    #[test]
    fn test_identical_bids_hit_cache() {
        let b = book(&[(99.99, 1.0), (99.98, 2.0), (99.97, 3.0)]);
        let mut model = SlippageModel::new(0.02, 100.0, 32);

        let first = model.estimate(&b);
        let second = model.estimate(&b.clone());
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(model.stats().fits, 1);
        assert_eq!(model.stats().cache_hits, 1);
    }

    #[test]
    fn test_zero_volume_falls_back_to_last_good() {
        let mut model = SlippageModel::new(0.02, 100.0, 32);
        let zero = book(&[(100.0, 0.0)]);
        assert_eq!(model.estimate(&zero), 0.0);
        assert_eq!(model.stats().failures, 1);

        let good = book(&[(100.0, 5.0)]);
        let value = model.estimate(&good);
        assert!(value > 0.0);

        assert_eq!(model.estimate(&zero), value);
        assert_eq!(model.last_slippage(), Some(value));
    }

    #[test]
    fn test_empty_bids_returns_last_good() {
        let mut model = SlippageModel::new(0.02, 100.0, 32);
        let empty = OrderBookSnapshot::new(vec![], vec![PriceLevel::new(101.0, 1.0)]);
        assert_eq!(model.estimate(&empty), 0.0);
    }
}
