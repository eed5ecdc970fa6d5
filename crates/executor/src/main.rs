use std::sync::Arc;

use dotenvy::dotenv;
use tokio::sync::broadcast;
use tracing::{error, info};

use common::actors::ActorType;
use common::config::EngineConfig;
use common::logger;
use common::models::Notification;
use engine::Notifier;
use engine::services::{
    AlertPublisher, IndicatorAlertService, NotificationService, OrderService,
    OrderTriggerService, PriceAlertService,
};
use market_data::remote::BinanceClient;
use market_data::services::{FeedGateway, IndicatorCache, TickerBroadcaster};
use market_data::{FeedCache, SubscriberHub};
use storage::db;

use crate::actors::supervisor::Supervisor;
use crate::server::AppState;
use crate::services::TelegramNotifier;

mod actors;
mod server;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();

    let config = EngineConfig::from_env();
    info!(
        "spot-sim starting: {} symbols, database {}",
        config.symbols.len(),
        config.database_url
    );

    let pool = db::connect(&config.database_url).await?;
    let cache = Arc::new(FeedCache::new());
    let hub = Arc::new(SubscriberHub::default());
    let (notify_tx, _) = broadcast::channel::<Notification>(1024);

    let closes = Arc::new(BinanceClient::new(&config.rest_base_url)?);
    let indicators = Arc::new(IndicatorCache::new(
        closes,
        config.closes_ttl,
        config.closes_limit,
    ));
    let orders = Arc::new(OrderService::from_config(pool.clone(), cache.clone(), &config));
    let publisher = AlertPublisher::new(pool.clone(), hub.clone(), notify_tx.clone());

    let mut supervisor = Supervisor::new();

    let (symbols, ws_url, reconnect) = (
        config.symbols.clone(),
        config.ws_base_url.clone(),
        config.feed_reconnect,
    );
    let (cache_for_gateway, hub_for_gateway) = (cache.clone(), hub.clone());
    supervisor.register_actor(
        ActorType::FeedGatewayActor,
        Box::new(move || {
            Box::new(FeedGateway::new(
                &symbols,
                &ws_url,
                reconnect,
                cache_for_gateway.clone(),
                hub_for_gateway.clone(),
            ))
        }),
    );

    let (cache_for_tickers, hub_for_tickers) = (cache.clone(), hub.clone());
    let broadcast_interval = config.broadcast_interval;
    supervisor.register_actor(
        ActorType::TickerBroadcastActor,
        Box::new(move || {
            Box::new(TickerBroadcaster::new(
                cache_for_tickers.clone(),
                hub_for_tickers.clone(),
                broadcast_interval,
            ))
        }),
    );

    let (orders_for_trigger, cache_for_trigger) = (orders.clone(), cache.clone());
    let order_tick = config.order_tick;
    supervisor.register_actor(
        ActorType::OrderTriggerActor,
        Box::new(move || {
            Box::new(OrderTriggerService::new(
                orders_for_trigger.clone(),
                cache_for_trigger.clone(),
                order_tick,
            ))
        }),
    );

    let (pool_for_price, cache_for_price, publisher_for_price) =
        (pool.clone(), cache.clone(), publisher.clone());
    let price_tick = config.price_alert_tick;
    supervisor.register_actor(
        ActorType::PriceAlertActor,
        Box::new(move || {
            Box::new(PriceAlertService::new(
                pool_for_price.clone(),
                cache_for_price.clone(),
                publisher_for_price.clone(),
                price_tick,
            ))
        }),
    );

    let (pool_for_bands, publisher_for_bands) = (pool.clone(), publisher.clone());
    let indicator_tick = config.indicator_alert_tick;
    supervisor.register_actor(
        ActorType::IndicatorAlertActor,
        Box::new(move || {
            Box::new(IndicatorAlertService::new(
                pool_for_bands.clone(),
                indicators.clone(),
                publisher_for_bands.clone(),
                indicator_tick,
            ))
        }),
    );

    match &config.telegram_token {
        Some(token) => {
            let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(token));
            let notify_rx = notify_tx.subscribe();
            supervisor.register_actor(
                ActorType::NotificationActor,
                Box::new(move || {
                    Box::new(NotificationService::new(
                        notifier.clone(),
                        notify_rx.resubscribe(),
                    ))
                }),
            );
        }
        None => info!("TELEGRAM_BOT_TOKEN not set, Telegram notifications disabled"),
    }

    let state = AppState { cache, hub };

    tokio::select! {
        result = server::serve(&config.server_addr, state) => {
            if let Err(e) = &result {
                error!("Stream endpoint stopped: {}", e);
            }
            result?;
        }
        _ = supervisor.start() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    pool.close().await;
    Ok(())
}
