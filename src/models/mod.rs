//! Transaction cost models and the maker/taker liquidity classifier.
//!
//! Every model owns its own memo store and its own last-good value. None of
//! them returns an error to the pipeline: a failed estimate degrades to the
//! previous good value (or zero) and is counted in [`ModelStats`].

pub mod cache;
pub mod cost;
pub mod estimator;
pub mod fee;
pub mod impact;
pub mod liquidity;
pub mod slippage;

pub use cache::{LruStore, MemoStore};
pub use cost::{CostEstimate, TradeCostCalculator};
pub use estimator::{BinaryClassifier, LogisticRegression, MedianRegression, ModelError, Regressor};
pub use fee::FeeModel;
pub use impact::MarketImpactModel;
pub use liquidity::{LiquidityClassifier, LiquiditySplit};
pub use slippage::SlippageModel;

/// Per-model counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    /// Successful estimator fits
    pub fits: u64,
    /// Estimates served from the model's memo store
    pub cache_hits: u64,
    /// Estimates produced by a documented fallback formula
    pub fallbacks: u64,
    /// Estimates that degraded to the last good value or zero
    pub failures: u64,
}
