//! Combined transaction cost for a quote-currency trade size.

use serde::Serialize;
use tracing::{debug, warn};

use super::fee::FeeModel;
use super::impact::MarketImpactModel;
use super::slippage::SlippageModel;
use crate::book::OrderBookSnapshot;

/// Cost components for one snapshot. `net_cost` is always the sum of the
/// three components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostEstimate {
    slippage: f64,
    fees: f64,
    impact: f64,
    net_cost: f64,
}

impl CostEstimate {
    pub fn new(slippage: f64, fees: f64, impact: f64) -> Self {
        Self {
            slippage,
            fees,
            impact,
            net_cost: slippage + fees + impact,
        }
    }

    pub fn slippage(&self) -> f64 {
        self.slippage
    }

    pub fn fees(&self) -> f64 {
        self.fees
    }

    pub fn impact(&self) -> f64 {
        self.impact
    }

    pub fn net_cost(&self) -> f64 {
        self.net_cost
    }
}

/// Owns the three cost models and the last complete estimate.
#[derive(Debug)]
pub struct TradeCostCalculator {
    slippage: SlippageModel,
    fees: FeeModel,
    impact: MarketImpactModel,
    last_cost: CostEstimate,
}

impl TradeCostCalculator {
    pub fn new(slippage: SlippageModel, fees: FeeModel, impact: MarketImpactModel) -> Self {
        debug!("trade_cost_calculator_initialized");
        Self {
            slippage,
            fees,
            impact,
            last_cost: CostEstimate::default(),
        }
    }

    pub fn slippage_model(&self) -> &SlippageModel {
        &self.slippage
    }

    pub fn impact_model(&self) -> &MarketImpactModel {
        &self.impact
    }

    pub fn last_cost(&self) -> CostEstimate {
        self.last_cost
    }

    /// Cost of buying `usd_quantity` worth at the best ask.
    ///
    /// Without an ask side no order size can be derived, so the last
    /// complete estimate is returned unchanged.
    pub fn calculate_total_cost(
        &mut self,
        usd_quantity: f64,
        book: &OrderBookSnapshot,
    ) -> CostEstimate {
        let Some(best_ask) = book.best_ask() else {
            warn!("no asks in book, reusing last cost estimate");
            return self.last_cost;
        };

        let order_size = usd_quantity / best_ask;
        if !order_size.is_finite() {
            warn!(usd_quantity, best_ask, "order size not finite, reusing last cost estimate");
            return self.last_cost;
        }

        let estimate = CostEstimate::new(
            self.slippage.estimate(book),
            self.fees.expected_fees(order_size, best_ask),
            self.impact.estimate(order_size, book),
        );
        self.last_cost = estimate;
        estimate
    }
}
