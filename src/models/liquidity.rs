//! Maker/taker liquidity split from a logistic classifier over book levels.
//!
//! Bid levels are labelled maker (1), ask levels taker (0). The classifier is
//! refitted from its previous coefficients at most once per retrain interval;
//! between refits the last fit is reused on the new features.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use super::cache::{levels_key, LevelsKey, LruStore, MemoStore};
use super::estimator::{BinaryClassifier, LogisticRegression, ModelError};
use super::ModelStats;
use crate::book::{OrderBookSnapshot, PriceLevel};

/// Floor applied to level volume before taking the log.
const MIN_LOG_VOLUME: f64 = 1e-3;

pub type SplitKey = (LevelsKey, LevelsKey);

/// Predicted share of maker vs. taker liquidity, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquiditySplit {
    pub maker_pct: f64,
    pub taker_pct: f64,
    pub available: bool,
}

impl LiquiditySplit {
    /// Taker share is always derived from the maker share.
    pub fn from_maker_pct(maker_pct: f64) -> Self {
        let maker_pct = maker_pct.clamp(0.0, 100.0);
        Self {
            maker_pct,
            taker_pct: 100.0 - maker_pct,
            available: true,
        }
    }

    /// Placeholder shown when no estimate could be produced.
    pub fn unavailable() -> Self {
        Self {
            maker_pct: 0.0,
            taker_pct: 0.0,
            available: false,
        }
    }

    pub fn maker_display(&self) -> String {
        display_pct(self.maker_pct, self.available)
    }

    pub fn taker_display(&self) -> String {
        display_pct(self.taker_pct, self.available)
    }
}

fn display_pct(pct: f64, available: bool) -> String {
    if available {
        format!("{:.1}%", pct)
    } else {
        "0%".to_string()
    }
}

/// Fitted classifier plus the instant of its last fit.
#[derive(Debug, Clone, Default)]
pub struct ClassifierState<C = LogisticRegression> {
    pub classifier: C,
    pub last_fit: Option<Instant>,
}

impl<C: BinaryClassifier> ClassifierState<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            last_fit: None,
        }
    }

    /// True when no model exists yet or the last fit is older than `interval`.
    pub fn is_stale(&self, now: Instant, interval: Duration) -> bool {
        match self.last_fit {
            Some(at) if self.classifier.is_fitted() => {
                now.saturating_duration_since(at) > interval
            }
            _ => true,
        }
    }
}

#[derive(Debug)]
pub struct LiquidityClassifier<S = LruStore<SplitKey, LiquiditySplit>, C = LogisticRegression> {
    retrain_interval: Duration,
    state: ClassifierState<C>,
    cache: S,
    stats: ModelStats,
}

impl LiquidityClassifier {
    pub fn new(retrain_interval: Duration, cache_capacity: usize) -> Self {
        Self::with_parts(
            retrain_interval,
            LruStore::new(cache_capacity),
            LogisticRegression::default(),
        )
    }
}

impl<S, C> LiquidityClassifier<S, C>
where
    S: MemoStore<SplitKey, LiquiditySplit>,
    C: BinaryClassifier,
{
    pub fn with_parts(retrain_interval: Duration, cache: S, classifier: C) -> Self {
        debug!(
            retrain_interval_ms = retrain_interval.as_millis() as u64,
            "liquidity_classifier_initialized"
        );
        Self {
            retrain_interval,
            state: ClassifierState::new(classifier),
            cache,
            stats: ModelStats::default(),
        }
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }

    pub fn state(&self) -> &ClassifierState<C> {
        &self.state
    }

    pub fn estimate(&mut self, book: &OrderBookSnapshot) -> LiquiditySplit {
        self.estimate_at(book, Instant::now())
    }

    /// Same as [`estimate`](Self::estimate) with an explicit clock reading.
    pub fn estimate_at(&mut self, book: &OrderBookSnapshot, now: Instant) -> LiquiditySplit {
        let (bids, asks) = (book.bids(), book.asks());
        let Some(mid) = book.mid_price() else {
            self.stats.failures += 1;
            debug!("liquidity split unavailable: one side of the book is empty");
            return LiquiditySplit::unavailable();
        };

        let Self {
            retrain_interval,
            state,
            cache,
            stats,
        } = self;

        let key = (levels_key(bids), levels_key(asks));
        let mut computed = false;
        let result = cache.get_or_try_insert_with(key, || {
            computed = true;
            classify(state, stats, bids, asks, mid, now, *retrain_interval)
        });
        if !computed {
            stats.cache_hits += 1;
        }

        match result {
            Ok(split) => split,
            Err(e) => {
                stats.failures += 1;
                warn!(error = %e, "liquidity_estimate_failed");
                LiquiditySplit::unavailable()
            }
        }
    }
}

fn classify<C: BinaryClassifier>(
    state: &mut ClassifierState<C>,
    stats: &mut ModelStats,
    bids: &[PriceLevel],
    asks: &[PriceLevel],
    mid: f64,
    now: Instant,
    retrain_interval: Duration,
) -> Result<LiquiditySplit, ModelError> {
    let (features, labels) = training_set(bids, asks, mid);

    if state.is_stale(now, retrain_interval) {
        state.classifier.fit(&features, &labels)?;
        state.last_fit = Some(now);
        stats.fits += 1;
        debug!(rows = labels.len(), "liquidity_classifier_refit");
    }

    let probs = state.classifier.predict_proba(&features)?;
    let maker_pct = probs.iter().mean() * 100.0;
    if !maker_pct.is_finite() {
        return Err(ModelError::NonFinite);
    }
    Ok(LiquiditySplit::from_maker_pct(maker_pct))
}

/// Rows `(price - mid, ln(max(volume, 1e-3)))`, bids first.
fn training_set(
    bids: &[PriceLevel],
    asks: &[PriceLevel],
    mid: f64,
) -> (DMatrix<f64>, DVector<f64>) {
    let rows = bids.len() + asks.len();
    let levels: Vec<&PriceLevel> = bids.iter().chain(asks.iter()).collect();

    let features = DMatrix::from_fn(rows, 2, |i, j| {
        let level = levels[i];
        if j == 0 {
            level.price - mid
        } else {
            level.volume.max(MIN_LOG_VOLUME).ln()
        }
    });
    let labels = DVector::from_fn(rows, |i, _| if i < bids.len() { 1.0 } else { 0.0 });
    (features, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            bids.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect(),
            asks.iter().map(|&(p, v)| PriceLevel::new(p, v)).collect(),
        )
    }

    fn sample() -> OrderBookSnapshot {
        book(
            &[(99.5, 2.0), (99.0, 1.0), (98.5, 4.0)],
            &[(100.5, 1.5), (101.0, 3.0)],
        )
    }

    #[test]
    fn test_split_sums_to_hundred() {
        let mut classifier = LiquidityClassifier::new(Duration::from_secs(5), 32);
        let split = classifier.estimate(&sample());
        assert!(split.available);
        assert!((split.maker_pct + split.taker_pct - 100.0).abs() < 1e-9);
        // Three of five rows are bids
        assert!(split.maker_pct > 50.0, "maker={}", split.maker_pct);
        assert_eq!(classifier.stats().fits, 1);
    }

    #[test]
    fn test_one_sided_book_is_unavailable() {
        let mut classifier = LiquidityClassifier::new(Duration::from_secs(5), 32);
        let split = classifier.estimate(&book(&[(99.0, 1.0)], &[]));
        assert!(!split.available);
        assert_eq!(split.maker_display(), "0%");
        assert_eq!(split.taker_display(), "0%");
        assert_eq!(classifier.stats().failures, 1);
    }

    #[test]
    fn test_cache_hit_does_not_retrain() {
        let mut classifier = LiquidityClassifier::new(Duration::ZERO, 32);
        let start = Instant::now();
        let first = classifier.estimate_at(&sample(), start);
        let second = classifier.estimate_at(&sample(), start + Duration::from_secs(60));
        assert_eq!(first, second);
        assert_eq!(classifier.stats().fits, 1);
        assert_eq!(classifier.stats().cache_hits, 1);
    }

    #[test]
    fn test_retrains_only_after_interval() {
        let mut classifier = LiquidityClassifier::new(Duration::from_secs(5), 32);
        let start = Instant::now();
        let other = book(&[(99.4, 2.0), (99.0, 1.0)], &[(100.6, 1.0), (101.0, 2.0)]);

        classifier.estimate_at(&sample(), start);
        classifier.estimate_at(&other, start + Duration::from_secs(1));
        assert_eq!(classifier.stats().fits, 1);

        let third = book(&[(99.3, 2.0), (99.0, 1.0)], &[(100.7, 1.0), (101.0, 2.0)]);
        classifier.estimate_at(&third, start + Duration::from_secs(6));
        assert_eq!(classifier.stats().fits, 2);
    }

    #[test]
    fn test_display_formats_one_decimal() {
        let split = LiquiditySplit::from_maker_pct(62.34);
        assert_eq!(split.maker_display(), "62.3%");
        assert_eq!(split.taker_display(), "37.7%");
    }

    #[test]
    fn test_state_staleness() {
        let state: ClassifierState = ClassifierState::new(LogisticRegression::default());
        assert!(state.is_stale(Instant::now(), Duration::from_secs(5)));
    }
}
