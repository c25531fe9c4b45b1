//! Records pushed to the presentation layer.
//!
//! The presenter only ever sees plain display-ready values. Events are
//! serialized untagged, so a consumer tells them apart by their keys:
//! `{"status": ..}`, `{"error": ..}` or a full estimate record.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::book::LevelText;
use crate::models::{CostEstimate, LiquiditySplit};
use crate::performance::{LatencySample, PerformanceStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeedEvent {
    Status { status: String },
    Error { error: String },
    Estimate(Box<EstimateRecord>),
}

impl FeedEvent {
    pub fn status(status: impl Into<String>) -> Self {
        Self::Status {
            status: status.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One fully formatted estimate for a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateRecord {
    /// Local wall clock, `HH:MM:SS.mmm`
    pub timestamp: String,
    pub slippage: String,
    pub fees: String,
    pub impact: String,
    pub net_cost: String,
    pub maker_proportion: String,
    pub taker_proportion: String,
    /// Top levels as `[price, volume]`, text as received from the feed
    pub bids: Vec<LevelText>,
    pub asks: Vec<LevelText>,
    pub volatility: String,
    pub processing_latency: String,
    pub total_latency: String,
    pub avg_latency: String,

    #[serde(skip)]
    pub cost: CostEstimate,
    #[serde(skip)]
    pub liquidity: LiquiditySplit,
}

impl EstimateRecord {
    pub fn new(
        timestamp: String,
        cost: CostEstimate,
        liquidity: LiquiditySplit,
        bids: &[LevelText],
        asks: &[LevelText],
        volatility: f64,
    ) -> Self {
        Self {
            timestamp,
            slippage: format!("{:.6}", cost.slippage()),
            fees: format!("${:.4}", cost.fees()),
            impact: format!("{:.6}", cost.impact()),
            net_cost: format!("${:.4}", cost.net_cost()),
            maker_proportion: liquidity.maker_display(),
            taker_proportion: liquidity.taker_display(),
            bids: bids.to_vec(),
            asks: asks.to_vec(),
            volatility: format!("{:.2}%", volatility * 100.0),
            processing_latency: String::new(),
            total_latency: String::new(),
            avg_latency: String::new(),
            cost,
            liquidity,
        }
    }

    pub fn set_latency(&mut self, sample: LatencySample, stats: &PerformanceStats) {
        self.processing_latency = format_ms(sample.processing_ms());
        self.total_latency = format_ms(sample.total_ms());
        self.avg_latency = format_ms(stats.mean_ms);
    }
}

fn format_ms(ms: f64) -> String {
    format!("{:.2}ms", ms)
}

/// One-way, non-blocking push into the presentation layer.
pub trait PresentationSink: Send {
    fn push(&self, event: FeedEvent);
}

impl PresentationSink for UnboundedSender<FeedEvent> {
    fn push(&self, event: FeedEvent) {
        // A closed presenter just means nobody is watching anymore
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EstimateRecord {
        EstimateRecord::new(
            "12:00:00.000".to_string(),
            CostEstimate::new(0.0123456789, 0.1, 0.0814),
            LiquiditySplit::from_maker_pct(60.0),
            &[["99.0".to_string(), "1.5".to_string()]],
            &[["101.0".to_string(), "2.0".to_string()]],
            0.02,
        )
    }

    #[test]
    fn test_display_formats() {
        let r = record();
        assert_eq!(r.slippage, "0.012346");
        assert_eq!(r.fees, "$0.1000");
        assert_eq!(r.impact, "0.081400");
        assert_eq!(r.net_cost, "$0.1937");
        assert_eq!(r.maker_proportion, "60.0%");
        assert_eq!(r.taker_proportion, "40.0%");
        assert_eq!(r.volatility, "2.00%");
    }

    #[test]
    fn test_untagged_serialization() {
        let status = serde_json::to_value(FeedEvent::status("Connected")).unwrap();
        assert_eq!(status, serde_json::json!({ "status": "Connected" }));

        let error = serde_json::to_value(FeedEvent::error("boom")).unwrap();
        assert_eq!(error, serde_json::json!({ "error": "boom" }));

        let estimate = serde_json::to_value(FeedEvent::Estimate(Box::new(record()))).unwrap();
        assert_eq!(estimate["bids"], serde_json::json!([["99.0", "1.5"]]));
        assert_eq!(estimate["asks"], serde_json::json!([["101.0", "2.0"]]));
        assert_eq!(estimate["net_cost"], "$0.1937");
        assert!(estimate.get("cost").is_none());
    }

    #[test]
    fn test_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<FeedEvent>();
        drop(rx);
        tx.push(FeedEvent::status("Connected"));
    }
}
