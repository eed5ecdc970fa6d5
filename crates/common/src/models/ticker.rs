use serde::{Deserialize, Serialize};

/// Latest known state of one symbol, as last reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub symbol: String,
    pub last_price: f64,
    /// Period open, used for the % change.
    pub open_price: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub change_percent: f64,
    /// Unix millis of the last overwrite.
    pub updated_at: i64,
}

pub fn change_percent(close: f64, open: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (close - open) / open * 100.0
}
