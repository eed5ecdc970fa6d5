use url::Url;

pub mod binance_client;
pub mod ticker_response;

pub use binance_client::BinanceClient;
pub use ticker_response::{FeedError, MiniTickerEvent, parse_feed_message};

/// `<base><sym>@miniTicker/<sym>@miniTicker/...` for the combined stream.
pub fn combined_stream_url(base: &str, symbols: &[String]) -> Result<Url, url::ParseError> {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@miniTicker", s.to_lowercase()))
        .collect();
    Url::parse(&format!("{}{}", base, streams.join("/")))
}

pub fn klines_url(base: &str) -> Result<Url, url::ParseError> {
    Url::parse(base)?.join("/api/v3/klines")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_lists_every_symbol() {
        let url = combined_stream_url(
            "wss://stream.binance.com:9443/stream?streams=",
            &["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@miniTicker/ethusdt@miniTicker"
        );
    }

    #[test]
    fn klines_url_ignores_trailing_path() {
        let url = klines_url("https://api.binance.com/").unwrap();
        assert_eq!(url.as_str(), "https://api.binance.com/api/v3/klines");
    }
}
