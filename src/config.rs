//! Simulator configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, TOML file,
//! `TRADESIM_*` environment variables, command-line flags (applied by the
//! binary).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str =
    "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Order book WebSocket endpoint
    pub endpoint: String,

    /// Nominal trade size in quote currency (USD)
    pub trade_size_usd: f64,
    pub fee_tier: f64,
    pub volatility: f64,
    pub impact_coefficient: f64,
    /// Entries per model memo store
    pub cache_capacity: usize,

    /// Consecutive failed attempts before giving up
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub retrain_interval_ms: u64,

    /// Book levels per side shown to the presenter
    pub display_depth: usize,
    /// Log a performance summary every N estimates
    pub summary_every: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            trade_size_usd: 100.0,
            fee_tier: 0.001,
            volatility: 0.02,
            impact_coefficient: 0.1,
            cache_capacity: 32,
            max_retries: 5,
            retry_delay_ms: 5_000,
            read_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            retrain_interval_ms: 5_000,
            display_depth: 5,
            summary_every: 100,
        }
    }
}

impl SimulatorConfig {
    /// Load from TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `TRADESIM_*` variables. Unparseable values are
    /// ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("TRADESIM_ENDPOINT") {
            if !v.trim().is_empty() {
                self.endpoint = v.trim().to_string();
            }
        }
        env_override("TRADESIM_TRADE_SIZE_USD", &mut self.trade_size_usd);
        env_override("TRADESIM_FEE_TIER", &mut self.fee_tier);
        env_override("TRADESIM_VOLATILITY", &mut self.volatility);
        env_override("TRADESIM_IMPACT_COEFFICIENT", &mut self.impact_coefficient);
        env_override("TRADESIM_CACHE_CAPACITY", &mut self.cache_capacity);
        env_override("TRADESIM_MAX_RETRIES", &mut self.max_retries);
        env_override("TRADESIM_RETRY_DELAY_MS", &mut self.retry_delay_ms);
        env_override("TRADESIM_READ_TIMEOUT_MS", &mut self.read_timeout_ms);
        env_override("TRADESIM_CONNECT_TIMEOUT_MS", &mut self.connect_timeout_ms);
        env_override("TRADESIM_RETRAIN_INTERVAL_MS", &mut self.retrain_interval_ms);
        env_override("TRADESIM_DISPLAY_DEPTH", &mut self.display_depth);
        env_override("TRADESIM_SUMMARY_EVERY", &mut self.summary_every);
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.trim().is_empty() {
            bail!("endpoint must not be empty");
        }
        if !(self.trade_size_usd.is_finite() && self.trade_size_usd > 0.0) {
            bail!("trade_size_usd must be positive, got {}", self.trade_size_usd);
        }
        for (name, value) in [
            ("fee_tier", self.fee_tier),
            ("volatility", self.volatility),
            ("impact_coefficient", self.impact_coefficient),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("{} must be non-negative, got {}", name, value);
            }
        }
        if self.cache_capacity == 0 {
            bail!("cache_capacity must be at least 1");
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        for (name, value) in [
            ("retry_delay_ms", self.retry_delay_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ] {
            if value == 0 {
                bail!("{} must be positive", name);
            }
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retrain_interval(&self) -> Duration {
        Duration::from_millis(self.retrain_interval_ms)
    }
}

fn env_override<T: FromStr>(name: &str, field: &mut T) {
    if let Ok(v) = std::env::var(name) {
        if let Ok(parsed) = v.trim().parse() {
            *field = parsed;
        } else {
            tracing::warn!(var = name, value = %v, "ignoring unparseable config override");
        }
    }
}
