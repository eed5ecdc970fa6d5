use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::remote::klines_url;
use crate::traits::ClosesSource;

const MAX_RETRIES: u32 = 2;

/// Read-only client for the public klines endpoint.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    klines_url: Url,
}

impl BinanceClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("spot_sim/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client.")?;

        Ok(Self {
            client,
            klines_url: klines_url(base_url).context("Invalid BINANCE_REST_URL")?,
        })
    }

    async fn fetch_with_backoff(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<f64>> {
        let mut retry_count = 0;

        loop {
            match self.make_request(symbol, interval, limit).await {
                Ok(rows) => return closes_from_klines(&rows),
                Err(e) if Self::is_rate_limit_error(&e) => {
                    retry_count += 1;
                    if retry_count > MAX_RETRIES {
                        bail!("Max retries exceeded for rate limit");
                    }

                    let backoff_seconds = 2_u64.pow(retry_count);
                    warn!(
                        "Rate limited on klines {} {}, backing off for {} seconds (attempt {}/{})",
                        symbol, interval, backoff_seconds, retry_count, MAX_RETRIES
                    );
                    sleep(Duration::from_secs(backoff_seconds)).await;
                }
                Err(e) => bail!("Failed to fetch klines for {} {}: {}", symbol, interval, e),
            }
        }
    }

    async fn make_request(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Vec<Value>>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.klines_url.clone())
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if status == 429 {
            bail!("HTTP 429: Too Many Requests");
        }
        if status == 418 {
            bail!("HTTP 418: IP has been auto-banned");
        }
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        if let Some(used_weight) = response.headers().get("x-mbx-used-weight-1m") {
            let used_weight: u32 = used_weight
                .to_str()
                .context("Invalid weight header")?
                .parse()
                .context("Failed to parse weight")?;

            if used_weight > 1000 {
                warn!("High API weight usage: {}", used_weight);
            } else {
                debug!("Used weights: {}/1200", used_weight);
            }
        }

        response
            .json::<Vec<Vec<Value>>>()
            .await
            .context("Failed to parse JSON response")
    }

    fn is_rate_limit_error(error: &anyhow::Error) -> bool {
        let error_str = error.to_string();
        error_str.contains("429") || error_str.contains("418") || error_str.contains("auto-banned")
    }
}

#[async_trait]
impl ClosesSource for BinanceClient {
    async fn fetch_closes(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<f64>> {
        self.fetch_with_backoff(symbol, interval, limit).await
    }
}

/// Close is element 4 of each kline row, encoded as a string.
pub fn closes_from_klines(rows: &[Vec<Value>]) -> anyhow::Result<Vec<f64>> {
    rows.iter()
        .map(|row| {
            let close = row.get(4).context("kline row without close")?;
            match close {
                Value::String(s) => s.parse::<f64>().context("Failed to parse close"),
                Value::Number(n) => n.as_f64().context("Close out of range"),
                other => bail!("Unexpected close value {}", other),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_close_column() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            [1, "1.0", "2.0", "0.5", "1.5", "10", 2, "15", 3, "5", "7", "0"],
            [2, "1.5", "2.5", "1.0", 2.25, "10", 3, "15", 3, "5", "7", "0"]
        ]))
        .unwrap();
        assert_eq!(closes_from_klines(&rows).unwrap(), vec![1.5, 2.25]);
    }

    #[test]
    fn short_rows_are_rejected() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([[1, "1.0"]])).unwrap();
        assert!(closes_from_klines(&rows).is_err());
    }

    #[test]
    fn rate_limit_errors_are_recognised() {
        assert!(BinanceClient::is_rate_limit_error(&anyhow::anyhow!(
            "HTTP 429: Too Many Requests"
        )));
        assert!(!BinanceClient::is_rate_limit_error(&anyhow::anyhow!("HTTP 500")));
    }
}
