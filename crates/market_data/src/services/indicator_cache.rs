use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strategy::{BB_MULTIPLIER, BB_PERIOD, compute_bands};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::traits::ClosesSource;

/// Closes below this window are never fetched, whatever the configuration says.
pub const MIN_CLOSES_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorBand {
    pub symbol: String,
    pub interval: String,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Latest close of the series the band was derived from.
    pub last_close: f64,
}

struct CachedCloses {
    closes: Arc<Vec<f64>>,
    fetched_at: Instant,
}

/// Short-lived memo of historical closes per (symbol, interval).
pub struct IndicatorCache {
    source: Arc<dyn ClosesSource>,
    entries: Mutex<HashMap<(String, String), CachedCloses>>,
    ttl: Duration,
    limit: usize,
}

impl IndicatorCache {
    pub fn new(source: Arc<dyn ClosesSource>, ttl: Duration, limit: usize) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            ttl,
            limit: limit.max(MIN_CLOSES_LIMIT),
        }
    }

    /// Fresh entry if one is younger than the TTL, otherwise a new fetch.
    /// A failed fetch falls back to the previous series, or to an empty one.
    pub async fn get_closes(&self, symbol: &str, interval: &str) -> Arc<Vec<f64>> {
        let key = (symbol.to_string(), interval.to_string());

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.closes.clone();
                }
            }
        }

        // Lock released: concurrent misses may fetch twice, last write wins.
        match self.source.fetch_closes(symbol, interval, self.limit).await {
            Ok(closes) => {
                debug!("Fetched {} closes for {} {}", closes.len(), symbol, interval);
                let closes = Arc::new(closes);
                self.entries.lock().await.insert(
                    key,
                    CachedCloses {
                        closes: closes.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                closes
            }
            Err(e) => {
                let entries = self.entries.lock().await;
                match entries.get(&key) {
                    Some(stale) => {
                        warn!(
                            "Closes fetch failed for {} {}: {}. Serving stale series",
                            symbol, interval, e
                        );
                        stale.closes.clone()
                    }
                    None => {
                        warn!("Closes fetch failed for {} {}: {}", symbol, interval, e);
                        Arc::new(Vec::new())
                    }
                }
            }
        }
    }

    /// Bollinger bands (20, 2) over the cached series.
    pub async fn bands(&self, symbol: &str, interval: &str) -> Option<IndicatorBand> {
        let closes = self.get_closes(symbol, interval).await;
        let bands = compute_bands(&closes, BB_PERIOD, BB_MULTIPLIER)?;
        Some(IndicatorBand {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            upper: bands.upper,
            middle: bands.middle,
            lower: bands.lower,
            last_close: *closes.last()?,
        })
    }
}
