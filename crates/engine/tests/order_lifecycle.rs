mod support;

use std::time::Duration;

use common::models::{OrderKind, OrderSide, OrderStatus, OrderType, StopStage};
use engine::services::{OrderTriggerService, TickReport};
use support::{feed, harness, order};

fn trigger(h: &support::Harness) -> OrderTriggerService {
    OrderTriggerService::new(h.orders.clone(), h.cache.clone(), Duration::from_secs(3))
}

#[tokio::test]
async fn limit_buy_then_stop_market_sell() {
    let h = harness(1000.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "BTCUSDT", 55.0);
    let buy = h
        .orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::Limit, 10.0, Some(50.0), None))
        .await
        .unwrap();
    assert_eq!(buy.status, OrderStatus::Pending);
    assert_eq!(buy.reserved_amount, 500.0);

    let report = scanner.run_tick().await.unwrap();
    assert_eq!(report.executed, 0);

    feed(&h.cache, "BTCUSDT", 48.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!(report.executed, 1);

    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 500.0);
    let holding = account.holding("BTCUSDT").unwrap();
    assert_eq!(holding.quantity, 10.0);
    assert_eq!(holding.avg_cost_basis, 50.0);

    let filled = h
        .orders
        .list_orders(h.user, Some(OrderStatus::Completed))
        .await
        .unwrap();
    assert_eq!(filled[0].executed_price, Some(50.0));

    feed(&h.cache, "BTCUSDT", 50.0);
    h.orders
        .submit_order(order(h.user, OrderSide::Sell, OrderType::StopMarket, 10.0, None, Some(45.0)))
        .await
        .unwrap();
    assert_eq!(scanner.run_tick().await.unwrap().executed, 0);

    feed(&h.cache, "BTCUSDT", 44.0);
    assert_eq!(scanner.run_tick().await.unwrap().executed, 1);

    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 940.0);
    assert!(account.holding("BTCUSDT").is_none());

    let trades = h.orders.trades(h.user).await.unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[1].price, 44.0);
    assert_eq!(trades[1].realized_pnl, Some(-60.0));
}

#[tokio::test]
async fn stop_limit_sell_arms_then_fills_at_limit() {
    let h = harness(10_000.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "BTCUSDT", 100.0);
    h.orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::Market, 1.0, None, None))
        .await
        .unwrap();

    feed(&h.cache, "BTCUSDT", 110.0);
    let stop = h
        .orders
        .submit_order(order(h.user, OrderSide::Sell, OrderType::StopLimit, 1.0, Some(95.0), Some(100.0)))
        .await
        .unwrap();
    assert_eq!(scanner.run_tick().await.unwrap(), TickReport { scanned: 1, ..TickReport::default() });

    // 99 meets both the stop and the limit; the tick only arms.
    feed(&h.cache, "BTCUSDT", 99.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.armed, report.executed), (1, 0));

    let pending = h.orders.pending_orders().await.unwrap();
    assert_eq!(pending[0].id, stop.id);
    assert!(matches!(
        pending[0].kind,
        OrderKind::StopLimit { stage: StopStage::Armed, .. }
    ));

    feed(&h.cache, "BTCUSDT", 96.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.armed, report.executed), (0, 1));

    let trades = h.orders.trades(h.user).await.unwrap();
    assert_eq!(trades.last().unwrap().price, 95.0);
    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 10_000.0 - 100.0 + 95.0);
}

#[tokio::test]
async fn stop_limit_buy_reserves_at_limit_and_fills_there() {
    let h = harness(10_000.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "BTCUSDT", 100.0);
    let stop = h
        .orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::StopLimit, 10.0, Some(108.0), Some(105.0)))
        .await
        .unwrap();
    assert_eq!(stop.reserved_amount, 1080.0);
    assert_eq!(h.orders.account(h.user).await.unwrap().unwrap().cash_balance, 8920.0);

    feed(&h.cache, "BTCUSDT", 104.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.armed, report.executed), (0, 0));

    // 106 crosses the stop and sits under the limit; arming still consumes the tick.
    feed(&h.cache, "BTCUSDT", 106.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.armed, report.executed), (1, 0));
    assert!(matches!(
        h.orders.pending_orders().await.unwrap()[0].kind,
        OrderKind::StopLimit { stage: StopStage::Armed, .. }
    ));

    feed(&h.cache, "BTCUSDT", 107.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.armed, report.executed), (0, 1));

    let trades = h.orders.trades(h.user).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 108.0);
    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 8920.0);
    let holding = account.holding("BTCUSDT").unwrap();
    assert_eq!(holding.quantity, 10.0);
    assert_eq!(holding.avg_cost_basis, 108.0);
}

#[tokio::test]
async fn repeated_ticks_on_one_snapshot_execute_once() {
    let h = harness(1000.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "BTCUSDT", 40.0);
    h.orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::Limit, 5.0, Some(45.0), None))
        .await
        .unwrap();

    let (a, b) = tokio::join!(scanner.run_tick(), scanner.run_tick());
    assert_eq!(a.unwrap().executed + b.unwrap().executed, 1);
    assert_eq!(scanner.run_tick().await.unwrap().scanned, 0);

    let account = h.orders.account(h.user).await.unwrap().unwrap();
    // Filled at the limit, so nothing is refunded.
    assert_eq!(account.cash_balance, 1000.0 - 225.0);
    assert_eq!(h.orders.trades(h.user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn orders_without_a_snapshot_are_skipped() {
    let h = harness(1000.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "ETHUSDT", 10.0);
    let mut eth = order(h.user, OrderSide::Buy, OrderType::Limit, 2.0, Some(9.0), None);
    eth.symbol = "ETHUSDT".into();
    h.orders.submit_order(eth).await.unwrap();

    // A fresh cache with no ETH price: nothing to judge against.
    let blind = OrderTriggerService::new(
        h.orders.clone(),
        std::sync::Arc::new(market_data::FeedCache::new()),
        Duration::from_secs(3),
    );
    let report = blind.run_tick().await.unwrap();
    assert_eq!((report.scanned, report.skipped), (1, 1));
    assert_eq!(scanner.run_tick().await.unwrap().executed, 0);
}

#[tokio::test]
async fn stop_market_buy_shortfall_blocks_until_cash_suffices() {
    let h = harness(105.0, None).await;
    let scanner = trigger(&h);

    feed(&h.cache, "BTCUSDT", 100.0);
    h.orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::StopMarket, 1.0, None, Some(101.0)))
        .await
        .unwrap();
    assert_eq!(h.orders.account(h.user).await.unwrap().unwrap().cash_balance, 5.0);

    // Fill at 110 needs 10 more than reserved; only 5 is available.
    feed(&h.cache, "BTCUSDT", 110.0);
    let report = scanner.run_tick().await.unwrap();
    assert_eq!((report.executed, report.failed), (0, 1));
    assert_eq!(h.orders.pending_orders().await.unwrap().len(), 1);
    assert_eq!(h.orders.account(h.user).await.unwrap().unwrap().cash_balance, 5.0);

    feed(&h.cache, "BTCUSDT", 104.0);
    assert_eq!(scanner.run_tick().await.unwrap().executed, 1);
    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 1.0);
    assert_eq!(account.holding("BTCUSDT").unwrap().avg_cost_basis, 104.0);
}

#[tokio::test]
async fn market_round_trip_conserves_value_at_reference() {
    let h = harness(1000.0, None).await;
    feed(&h.cache, "BTCUSDT", 25.0);

    h.orders
        .submit_order(order(h.user, OrderSide::Buy, OrderType::Market, 8.0, None, None))
        .await
        .unwrap();
    let account = h.orders.account(h.user).await.unwrap().unwrap();
    let equity = account.equity(|s| h.cache.price(s));
    assert_eq!(equity, 1000.0);

    h.orders
        .submit_order(order(h.user, OrderSide::Sell, OrderType::Market, 8.0, None, None))
        .await
        .unwrap();
    let account = h.orders.account(h.user).await.unwrap().unwrap();
    assert_eq!(account.cash_balance, 1000.0);
    assert!(account.holdings.is_empty());
}
