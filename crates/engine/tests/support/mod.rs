#![allow(dead_code)]

use std::sync::Arc;

use common::models::{OrderRequest, OrderSide, OrderType, PriceSnapshot};
use engine::services::OrderService;
use market_data::FeedCache;
use storage::db::memory_pool;
use storage::{Ledger, SqlitePool};

pub struct Harness {
    pub pool: SqlitePool,
    pub cache: Arc<FeedCache>,
    pub orders: Arc<OrderService>,
    pub user: i64,
}

pub async fn harness(cash: f64, chat_id: Option<&str>) -> Harness {
    let pool = memory_pool().await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let user = Ledger::open_account(&mut conn, "sim", cash, chat_id)
        .await
        .unwrap();
    drop(conn);

    let cache = Arc::new(FeedCache::new());
    let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
    let orders = Arc::new(OrderService::new(pool.clone(), cache.clone(), &symbols, 5.0));
    Harness {
        pool,
        cache,
        orders,
        user,
    }
}

pub fn feed(cache: &FeedCache, symbol: &str, price: f64) {
    cache.upsert(PriceSnapshot {
        symbol: symbol.into(),
        last_price: price,
        open_price: price,
        high: price,
        low: price,
        volume: 0.0,
        quote_volume: 0.0,
        change_percent: 0.0,
        updated_at: 0,
    });
}

pub fn order(
    user_id: i64,
    side: OrderSide,
    order_type: OrderType,
    quantity: f64,
    limit_price: Option<f64>,
    stop_price: Option<f64>,
) -> OrderRequest {
    OrderRequest {
        user_id,
        symbol: "BTCUSDT".into(),
        side,
        quantity,
        order_type,
        limit_price,
        stop_price,
    }
}
