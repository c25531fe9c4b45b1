//! Raw feed message → cost estimate record.

use chrono::Local;
use tracing::{debug, warn};

use crate::book::OrderBookSnapshot;
use crate::config::SimulatorConfig;
use crate::events::EstimateRecord;
use crate::feed::codec::{decode_snapshot, DecodeError};
use crate::models::{
    FeeModel, LiquidityClassifier, MarketImpactModel, ModelStats, SlippageModel,
    TradeCostCalculator,
};

/// Message shown to the presenter for a structurally invalid or empty book.
pub const INVALID_BOOK: &str = "Invalid orderbook data";

/// Result of one pipeline pass.
#[derive(Debug)]
pub enum PipelineOutcome {
    Estimate(Box<EstimateRecord>),
    /// Book decoded badly or is empty; surfaced to the presenter
    Rejected(String),
    /// Payload was not a JSON object; logged only
    Skipped(DecodeError),
}

/// Counters of every model owned by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub slippage: ModelStats,
    pub impact: ModelStats,
    pub liquidity: ModelStats,
}

pub struct CostPipeline {
    calculator: TradeCostCalculator,
    classifier: LiquidityClassifier,
    trade_size_usd: f64,
    volatility: f64,
    display_depth: usize,
}

impl CostPipeline {
    pub fn new(config: &SimulatorConfig) -> Self {
        let calculator = TradeCostCalculator::new(
            SlippageModel::new(config.volatility, config.trade_size_usd, config.cache_capacity),
            FeeModel::new(config.fee_tier),
            MarketImpactModel::new(config.impact_coefficient, config.cache_capacity),
        );
        let classifier = LiquidityClassifier::new(config.retrain_interval(), config.cache_capacity);
        Self {
            calculator,
            classifier,
            trade_size_usd: config.trade_size_usd,
            volatility: config.volatility,
            display_depth: config.display_depth,
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            slippage: self.calculator.slippage_model().stats(),
            impact: self.calculator.impact_model().stats(),
            liquidity: self.classifier.stats(),
        }
    }

    /// Decode and estimate. Never panics and never returns an error.
    pub fn process(&mut self, raw: &str) -> PipelineOutcome {
        match decode_snapshot(raw) {
            Ok(book) => self.process_snapshot(&book),
            Err(e) if e.is_malformed() => {
                debug!(error = %e, "skipping malformed payload");
                PipelineOutcome::Skipped(e)
            }
            Err(e) => {
                warn!(error = %e, "received invalid orderbook data");
                PipelineOutcome::Rejected(format!("{}: {}", INVALID_BOOK, e))
            }
        }
    }

    pub fn process_snapshot(&mut self, book: &OrderBookSnapshot) -> PipelineOutcome {
        if !book.is_usable() {
            warn!("received empty orderbook");
            return PipelineOutcome::Rejected(INVALID_BOOK.to_string());
        }

        let cost = self.calculator.calculate_total_cost(self.trade_size_usd, book);
        let liquidity = self.classifier.estimate(book);

        let record = EstimateRecord::new(
            Local::now().format("%H:%M:%S%.3f").to_string(),
            cost,
            liquidity,
            book.top_bid_text(self.display_depth),
            book.top_ask_text(self.display_depth),
            self.volatility,
        );
        PipelineOutcome::Estimate(Box::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FeedEvent;

    const BOOK: &str = r#"{
        "timestamp": "2025-05-04T10:39:13Z",
        "exchange": "OKX",
        "symbol": "BTC-USDT-SWAP",
        "asks": [["95445.5", "9.06"], ["95448.0", "2.05"], ["95450.1", "0.5"]],
        "bids": [["95445.4", "1104.23"], ["95445.3", "0.02"], ["95444.0", "3.1"]]
    }"#;

    fn pipeline() -> CostPipeline {
        CostPipeline::new(&SimulatorConfig::default())
    }

    #[test]
    fn test_estimate_record() {
        let mut p = pipeline();
        let PipelineOutcome::Estimate(record) = p.process(BOOK) else {
            panic!("expected an estimate");
        };
        let cost = record.cost;
        assert_eq!(cost.net_cost(), cost.slippage() + cost.fees() + cost.impact());
        assert!(record.liquidity.available);
        assert!((record.liquidity.maker_pct + record.liquidity.taker_pct - 100.0).abs() < 1e-9);
        assert_eq!(record.bids[0], ["95445.4", "1104.23"]);
        assert_eq!(record.asks[0], ["95445.5", "9.06"]);
        assert_eq!(record.volatility, "2.00%");
        assert_eq!(record.timestamp.len(), "HH:MM:SS.mmm".len());
    }

    #[test]
    fn test_levels_keep_feed_formatting() {
        let mut p = pipeline();
        let raw = r#"{"bids": [["95445.40", "1104.230"]], "asks": [["95445.50", "9.060"]]}"#;
        let PipelineOutcome::Estimate(record) = p.process(raw) else {
            panic!("expected an estimate");
        };

        let json = serde_json::to_value(FeedEvent::Estimate(record)).unwrap();
        assert_eq!(json["bids"][0], serde_json::json!(["95445.40", "1104.230"]));
        assert_eq!(json["asks"][0], serde_json::json!(["95445.50", "9.060"]));
        assert!(json["bids"][0][0].is_string());
    }

    #[test]
    fn test_top_levels_are_limited() {
        let mut cfg = SimulatorConfig::default();
        cfg.display_depth = 2;
        let mut p = CostPipeline::new(&cfg);
        let PipelineOutcome::Estimate(record) = p.process(BOOK) else {
            panic!("expected an estimate");
        };
        assert_eq!(record.bids.len(), 2);
        assert_eq!(record.asks.len(), 2);
    }

    #[test]
    fn test_empty_book_is_rejected() {
        let mut p = pipeline();
        match p.process(r#"{"bids": [], "asks": []}"#) {
            PipelineOutcome::Rejected(msg) => assert_eq!(msg, INVALID_BOOK),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_missing_side_is_rejected() {
        let mut p = pipeline();
        match p.process(r#"{"bids": [["1", "1"]]}"#) {
            PipelineOutcome::Rejected(msg) => assert!(msg.starts_with(INVALID_BOOK)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_is_skipped() {
        let mut p = pipeline();
        assert!(matches!(p.process("not json"), PipelineOutcome::Skipped(_)));
    }

    #[test]
    fn test_identical_snapshot_reuses_cached_models() {
        let mut p = pipeline();
        p.process(BOOK);
        let first = p.stats();
        assert_eq!(first.impact.fits, 1);
        p.process(BOOK);
        let second = p.stats();

        assert_eq!(second.slippage.fits, first.slippage.fits);
        assert_eq!(second.impact.fits, first.impact.fits);
        assert_eq!(second.liquidity.fits, first.liquidity.fits);
        assert_eq!(second.slippage.cache_hits, first.slippage.cache_hits + 1);
        assert_eq!(second.impact.cache_hits, first.impact.cache_hits + 1);
        assert_eq!(second.liquidity.cache_hits, first.liquidity.cache_hits + 1);
    }
}
