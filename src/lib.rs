//! TradeSim Backend Library
//!
//! Streams L2 order book snapshots, estimates the transaction cost of a
//! nominal trade for each one and pushes display-ready records to a
//! presenter. Exposed for the `tradesim` binary and the integration tests.

pub mod book;
pub mod config;
pub mod events;
pub mod feed;
pub mod models;
pub mod performance;
pub mod pipeline;

pub use book::{LevelText, OrderBookSnapshot, PriceLevel};
pub use config::SimulatorConfig;
pub use events::{EstimateRecord, FeedEvent, PresentationSink};
pub use pipeline::{CostPipeline, PipelineOutcome};
