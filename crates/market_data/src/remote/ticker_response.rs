use common::models::{PriceSnapshot, change_percent};
use common::now_millis;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::traits::RemoteResponse;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed feed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feed message has no {0}")]
    MissingField(&'static str),
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("unexpected stream {0}")]
    UnknownStream(String),
}

/// Binance sends prices as strings; some relays send plain numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Text(String),
    Number(f64),
}

impl WireNumber {
    fn parse(&self, field: &'static str) -> Result<f64, FeedError> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().map_err(|_| FeedError::InvalidNumber {
                field,
                value: s.clone(),
            })?,
        };
        if !value.is_finite() {
            return Err(FeedError::InvalidNumber {
                field,
                value: value.to_string(),
            });
        }
        Ok(value)
    }
}

#[derive(Deserialize)]
struct RawStreamEvent {
    stream: String,
    data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiniTickerEvent {
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    #[serde(rename = "c", default)]
    pub close: Option<WireNumber>,
    #[serde(rename = "o", default)]
    pub open: Option<WireNumber>,
    #[serde(rename = "h", default)]
    pub high: Option<WireNumber>,
    #[serde(rename = "l", default)]
    pub low: Option<WireNumber>,
    #[serde(rename = "v", default)]
    pub volume: Option<WireNumber>,
    #[serde(rename = "q", default)]
    pub quote_volume: Option<WireNumber>,
}

fn optional(value: &Option<WireNumber>, field: &'static str) -> Result<Option<f64>, FeedError> {
    value.as_ref().map(|v| v.parse(field)).transpose()
}

impl RemoteResponse<PriceSnapshot> for MiniTickerEvent {
    type Error = FeedError;

    fn to_model(&self) -> Result<PriceSnapshot, FeedError> {
        let symbol = self
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(FeedError::MissingField("symbol"))?
            .to_uppercase();
        let close = self
            .close
            .as_ref()
            .ok_or(FeedError::MissingField("close"))?
            .parse("close")?;
        let open = optional(&self.open, "open")?.unwrap_or(close);

        Ok(PriceSnapshot {
            symbol,
            last_price: close,
            open_price: open,
            high: optional(&self.high, "high")?.unwrap_or(close),
            low: optional(&self.low, "low")?.unwrap_or(close),
            volume: optional(&self.volume, "volume")?.unwrap_or(0.0),
            quote_volume: optional(&self.quote_volume, "quoteVolume")?.unwrap_or(0.0),
            change_percent: change_percent(close, open),
            updated_at: now_millis(),
        })
    }
}

/// Accepts both the combined-stream envelope and a bare ticker payload.
pub fn parse_feed_message(text: &str) -> Result<PriceSnapshot, FeedError> {
    let value: Value = serde_json::from_str(text)?;

    let payload = if value.get("stream").is_some() && value.get("data").is_some() {
        let raw: RawStreamEvent = serde_json::from_value(value)?;
        if !raw.stream.ends_with("@miniTicker") {
            return Err(FeedError::UnknownStream(raw.stream));
        }
        raw.data
    } else {
        value
    };

    serde_json::from_value::<MiniTickerEvent>(payload)?.to_model()
}
