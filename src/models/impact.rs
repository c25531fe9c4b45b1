//! Market impact split into a temporary and a permanent component.

use tracing::{debug, warn};

use super::cache::{LruStore, MemoStore};
use super::estimator::ModelError;
use super::ModelStats;
use crate::book::OrderBookSnapshot;

/// Share of the temporary impact that persists after the trade.
const PERMANENT_FRACTION: f64 = 0.3;

/// Exact `(order_size, best_ask, best_bid)` key.
pub type ImpactKey = (u64, u64, u64);

/// `temp = k · size^1.5 · spread / best_ask`, `perm = 0.3 · temp`,
/// impact = temp + perm.
#[derive(Debug)]
pub struct MarketImpactModel<S = LruStore<ImpactKey, f64>> {
    impact_coefficient: f64,
    last_impact: Option<f64>,
    cache: S,
    stats: ModelStats,
}

impl MarketImpactModel {
    pub fn new(impact_coefficient: f64, cache_capacity: usize) -> Self {
        Self::with_store(impact_coefficient, LruStore::new(cache_capacity))
    }
}

impl<S: MemoStore<ImpactKey, f64>> MarketImpactModel<S> {
    pub fn with_store(impact_coefficient: f64, cache: S) -> Self {
        debug!(impact_coefficient, "impact_model_initialized");
        Self {
            impact_coefficient,
            last_impact: None,
            cache,
            stats: ModelStats::default(),
        }
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }

    pub fn last_impact(&self) -> Option<f64> {
        self.last_impact
    }

    /// Impact for `order_size` against the top of `book`. Never fails.
    pub fn estimate(&mut self, order_size: f64, book: &OrderBookSnapshot) -> f64 {
        let (Some(best_ask), Some(best_bid)) = (book.best_ask(), book.best_bid()) else {
            self.stats.failures += 1;
            return self.last_impact.unwrap_or(0.0);
        };

        let key = (order_size.to_bits(), best_ask.to_bits(), best_bid.to_bits());
        let coefficient = self.impact_coefficient;
        let mut computed = false;
        let result = self.cache.get_or_try_insert_with(key, || {
            computed = true;
            impact(coefficient, order_size, best_ask, best_bid)
        });

        match result {
            Ok(value) => {
                if computed {
                    self.stats.fits += 1;
                } else {
                    self.stats.cache_hits += 1;
                }
                self.last_impact = Some(value);
                value
            }
            Err(e) => {
                self.stats.failures += 1;
                warn!(
                    error = %e,
                    order_size, best_ask, best_bid,
                    "impact_estimate_failed, using last good value"
                );
                self.last_impact.unwrap_or(0.0)
            }
        }
    }
}

fn impact(
    coefficient: f64,
    order_size: f64,
    best_ask: f64,
    best_bid: f64,
) -> Result<f64, ModelError> {
    let spread = best_ask - best_bid;
    if best_ask <= 0.0 || order_size < 0.0 {
        return Err(ModelError::InvalidInput("non-positive ask or negative size"));
    }
    if spread < 0.0 {
        return Err(ModelError::InvalidInput("crossed book"));
    }
    let temporary = coefficient * order_size.powf(1.5) * spread / best_ask;
    let permanent = PERMANENT_FRACTION * temporary;
    let total = temporary + permanent;
    if total.is_finite() {
        Ok(total)
    } else {
        Err(ModelError::NonFinite)
    }
}
