//! Feed payload decoding.
//!
//! Turns one raw text frame into a validated [`OrderBookSnapshot`]. Levels
//! arrive as `[price, volume]` pairs where each entry may be a JSON number
//! or a numeric string (`["65000.1", "0.25"]`). The original text of each
//! entry is kept for display. Anything that cannot be turned into a
//! complete snapshot is rejected as a whole.

use serde_json::Value;

use crate::book::{LevelText, OrderBookSnapshot, PriceLevel};

/// Reasons a payload could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Not JSON, or JSON that is not an object
    MalformedPayload(String),
    MissingField(&'static str),
    NotAnArray(&'static str),
    InvalidLevel { side: &'static str, index: usize },
    InvalidNumber { side: &'static str, index: usize },
    OutOfRange { side: &'static str, index: usize },
}

impl DecodeError {
    /// Payloads that are not structured data at all. These are dropped
    /// silently by the pipeline instead of being reported downstream.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload(_))
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload(e) => write!(f, "malformed payload: {}", e),
            Self::MissingField(name) => write!(f, "missing field '{}'", name),
            Self::NotAnArray(name) => write!(f, "'{}' is not an array", name),
            Self::InvalidLevel { side, index } => {
                write!(f, "{} level {} is not a [price, volume] pair", side, index)
            }
            Self::InvalidNumber { side, index } => {
                write!(f, "{} level {} has a non-numeric entry", side, index)
            }
            Self::OutOfRange { side, index } => {
                write!(f, "{} level {} has an out-of-range price or volume", side, index)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a raw feed message.
pub fn decode_snapshot(raw: &str) -> Result<OrderBookSnapshot, DecodeError> {
    let json: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let obj = json
        .as_object()
        .ok_or_else(|| DecodeError::MalformedPayload("expected a JSON object".to_string()))?;

    let bids = decode_side(obj.get("bids"), "bids")?;
    let asks = decode_side(obj.get("asks"), "asks")?;

    let mut snapshot = OrderBookSnapshot::with_text(bids, asks);
    snapshot.exchange_ts = obj.get("timestamp").and_then(text_field);
    snapshot.symbol = obj.get("symbol").and_then(text_field);
    Ok(snapshot)
}

fn decode_side(
    value: Option<&Value>,
    side: &'static str,
) -> Result<Vec<(PriceLevel, LevelText)>, DecodeError> {
    let levels = value
        .ok_or(DecodeError::MissingField(side))?
        .as_array()
        .ok_or(DecodeError::NotAnArray(side))?;

    let mut out = Vec::with_capacity(levels.len());
    for (index, level) in levels.iter().enumerate() {
        let pair = level
            .as_array()
            .filter(|p| p.len() >= 2)
            .ok_or(DecodeError::InvalidLevel { side, index })?;

        let price = coerce_number(&pair[0]).ok_or(DecodeError::InvalidNumber { side, index })?;
        let volume = coerce_number(&pair[1]).ok_or(DecodeError::InvalidNumber { side, index })?;

        if !(price.is_finite() && price > 0.0 && volume.is_finite() && volume >= 0.0) {
            return Err(DecodeError::OutOfRange { side, index });
        }
        out.push((
            PriceLevel::new(price, volume),
            [entry_text(&pair[0]), entry_text(&pair[1])],
        ));
    }
    Ok(out)
}

/// Accept JSON numbers and numeric strings.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => fast_float::parse::<f64, _>(s.trim()).ok(),
        _ => None,
    }
}

/// Feed text of a numeric entry that already passed `coerce_number`.
fn entry_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
