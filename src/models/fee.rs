//! Exchange fee estimate for a taker order.

use tracing::debug;

/// Flat fee tier applied to the notional of the order.
#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    fee_tier: f64,
}

impl FeeModel {
    pub fn new(fee_tier: f64) -> Self {
        debug!(fee_tier, "fee_model_initialized");
        Self { fee_tier }
    }

    pub fn fee_tier(&self) -> f64 {
        self.fee_tier
    }

    /// `fee_tier × order_size × price`, or 0.0 for any invalid input.
    pub fn expected_fees(&self, order_size: f64, price: f64) -> f64 {
        let fees = self.fee_tier * order_size * price;
        if fees.is_finite() && fees >= 0.0 && order_size >= 0.0 && price >= 0.0 {
            fees
        } else {
            debug!(order_size, price, "fee inputs invalid, reporting zero");
            0.0
        }
    }
}
