use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, time};
use tracing::{debug, info};

use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::StreamEvent,
};

use crate::{broadcast::SubscriberHub, feed_cache::FeedCache};

/// Pushes the full ticker set to every subscriber on a fixed cadence.
pub struct TickerBroadcaster {
    cache: Arc<FeedCache>,
    hub: Arc<SubscriberHub>,
    interval: Duration,
}

#[async_trait]
impl Actor for TickerBroadcaster {
    fn name(&self) -> ActorType {
        ActorType::TickerBroadcastActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx);
        info!("Starting ticker broadcaster every {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let delivered = self.broadcast_once();
            debug!("Tickers delivered to {} subscribers", delivered);
        }
    }
}

impl TickerBroadcaster {
    pub fn new(cache: Arc<FeedCache>, hub: Arc<SubscriberHub>, interval: Duration) -> Self {
        Self {
            cache,
            hub,
            interval,
        }
    }

    pub fn broadcast_once(&self) -> usize {
        if self.cache.is_empty() || self.hub.is_empty() {
            return 0;
        }
        self.hub.publish(&StreamEvent::Tickers {
            data: self.cache.all(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::PriceSnapshot;

    #[test]
    fn skips_empty_cache_and_prunes_on_publish() {
        let cache = Arc::new(FeedCache::new());
        let hub = Arc::new(SubscriberHub::default());
        let broadcaster = TickerBroadcaster::new(cache.clone(), hub.clone(), Duration::from_secs(1));

        let (_, mut live) = hub.subscribe(&cache);
        let (_, dead) = hub.subscribe(&cache);
        drop(dead);
        live.try_recv().unwrap();

        assert_eq!(broadcaster.broadcast_once(), 0);
        assert_eq!(hub.len(), 2);

        cache.upsert(PriceSnapshot {
            symbol: "ETHUSDT".into(),
            last_price: 3000.0,
            open_price: 3000.0,
            high: 3000.0,
            low: 3000.0,
            volume: 0.0,
            quote_volume: 0.0,
            change_percent: 0.0,
            updated_at: 0,
        });
        assert_eq!(broadcaster.broadcast_once(), 1);
        assert_eq!(hub.len(), 1);

        let frame: serde_json::Value = serde_json::from_str(&live.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "tickers");
        assert_eq!(frame["data"][0]["lastPrice"], 3000.0);
    }
}
