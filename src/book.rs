//! Order book snapshot types.
//!
//! A snapshot is built once per feed message by the codec, read by every
//! model during a single pipeline pass, and then dropped.

use serde::Serialize;

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

impl PriceLevel {
    #[inline]
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }

    /// Bit-exact representation used for cache keys.
    #[inline]
    pub fn key_bits(&self) -> (u64, u64) {
        (self.price.to_bits(), self.volume.to_bits())
    }

    /// Shortest round-trip text, for levels that did not come off the wire.
    pub fn to_text(&self) -> LevelText {
        [self.price.to_string(), self.volume.to_string()]
    }
}

/// A level as `[price, volume]` display text, verbatim from the feed.
pub type LevelText = [String; 2];

/// Point-in-time view of the book: bids descending, asks ascending.
///
/// Each side keeps the feed's own text for every level, in the same order
/// as the numeric levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBookSnapshot {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    bid_text: Vec<LevelText>,
    ask_text: Vec<LevelText>,
    /// Exchange timestamp as sent by the feed, if any
    pub exchange_ts: Option<String>,
    pub symbol: Option<String>,
}

impl OrderBookSnapshot {
    /// Build a snapshot, putting both sides into canonical order.
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        let paired = |levels: Vec<PriceLevel>| -> Vec<(PriceLevel, LevelText)> {
            levels.into_iter().map(|l| (l, l.to_text())).collect()
        };
        Self::with_text(paired(bids), paired(asks))
    }

    /// Build a snapshot from decoded levels paired with their feed text.
    pub fn with_text(
        mut bids: Vec<(PriceLevel, LevelText)>,
        mut asks: Vec<(PriceLevel, LevelText)>,
    ) -> Self {
        bids.sort_by(|a, b| {
            b.0.price
                .partial_cmp(&a.0.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        asks.sort_by(|a, b| {
            a.0.price
                .partial_cmp(&b.0.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let (bids, bid_text) = bids.into_iter().unzip();
        let (asks, ask_text) = asks.into_iter().unzip();
        Self {
            bids,
            asks,
            bid_text,
            ask_text,
            exchange_ts: None,
            symbol: None,
        }
    }

    #[inline]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    #[inline]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    #[inline]
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    #[inline]
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid_price(&self) -> Option<f64> {
        Some((self.best_bid()? + self.best_ask()?) * 0.5)
    }

    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// At least one side must carry levels for any downstream computation.
    #[inline]
    pub fn is_usable(&self) -> bool {
        !self.bids.is_empty() || !self.asks.is_empty()
    }

    pub fn total_bid_volume(&self) -> f64 {
        self.bids.iter().map(|l| l.volume).sum()
    }

    pub fn top_bids(&self, depth: usize) -> &[PriceLevel] {
        &self.bids[..depth.min(self.bids.len())]
    }

    pub fn top_asks(&self, depth: usize) -> &[PriceLevel] {
        &self.asks[..depth.min(self.asks.len())]
    }

    pub fn top_bid_text(&self, depth: usize) -> &[LevelText] {
        &self.bid_text[..depth.min(self.bid_text.len())]
    }

    pub fn top_ask_text(&self, depth: usize) -> &[LevelText] {
        &self.ask_text[..depth.min(self.ask_text.len())]
    }
}
