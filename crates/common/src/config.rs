use std::collections::HashSet;
use std::env;
use std::time::Duration;

const DEFAULT_SYMBOLS: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT",
    "DOTUSDT", "LINKUSDT",
];

/// Engine configuration derived from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    /// Upper-case symbols streamed from the feed and accepted for orders/alerts.
    pub symbols: Vec<String>,
    pub ws_base_url: String,
    pub rest_base_url: String,
    pub server_addr: String,
    /// Unset or empty disables Telegram notifications.
    pub telegram_token: Option<String>,

    pub feed_reconnect: Duration,
    pub broadcast_interval: Duration,
    pub order_tick: Duration,
    pub price_alert_tick: Duration,
    pub indicator_alert_tick: Duration,

    pub closes_ttl: Duration,
    pub closes_limit: usize,
    pub min_order_notional: f64,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let symbols = match env_opt("TRACKED_SYMBOLS") {
            Some(raw) => parse_symbols(&raw),
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            database_url: env_str("DATABASE_URL", "sqlite:spot_sim.db"),
            symbols,
            ws_base_url: env_str(
                "BINANCE_WS_URL",
                "wss://stream.binance.com:9443/stream?streams=",
            ),
            rest_base_url: env_str("BINANCE_REST_URL", "https://api.binance.com"),
            server_addr: env_str("SERVER_ADDR", "0.0.0.0:8080"),
            telegram_token: env_opt("TELEGRAM_BOT_TOKEN"),
            feed_reconnect: Duration::from_secs(env_u64("FEED_RECONNECT_SECS", 5)),
            broadcast_interval: Duration::from_millis(env_u64("BROADCAST_INTERVAL_MS", 1000)),
            order_tick: Duration::from_millis(env_u64("ORDER_TICK_MS", 3000)),
            price_alert_tick: Duration::from_millis(env_u64("PRICE_ALERT_TICK_MS", 3000)),
            indicator_alert_tick: Duration::from_millis(env_u64("INDICATOR_ALERT_TICK_MS", 30_000)),
            closes_ttl: Duration::from_secs(env_u64("CLOSES_TTL_SECS", 30)),
            closes_limit: (env_u64("CLOSES_LIMIT", 100) as usize).max(50),
            min_order_notional: env_f64("MIN_ORDER_NOTIONAL", 5.0),
        }
    }

    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}
