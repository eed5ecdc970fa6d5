use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::{AlertCondition, AlertType};
use market_data::FeedCache;
use storage::SqlitePool;
use storage::repositories::AlertsRepository;
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info};

use crate::alerts::{price_condition_met, price_message};
use crate::services::AlertPublisher;

pub struct PriceAlertService {
    pool: SqlitePool,
    cache: Arc<FeedCache>,
    publisher: AlertPublisher,
    interval: Duration,
}

#[async_trait]
impl Actor for PriceAlertService {
    fn name(&self) -> ActorType {
        ActorType::PriceAlertActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());
        info!("Starting price alert scanner every {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_tick().await {
                Ok(0) => {}
                Ok(n) => debug!("Price alerts triggered this tick: {}", n),
                Err(e) => {
                    error!("Price alert scan failed: {}", e);
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            format!("Price alert scan failed: {}", e),
                        ))
                        .await?;
                }
            }
        }
    }
}

impl PriceAlertService {
    pub fn new(
        pool: SqlitePool,
        cache: Arc<FeedCache>,
        publisher: AlertPublisher,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            publisher,
            interval,
        }
    }

    /// Returns how many alerts this tick triggered.
    pub async fn run_tick(&self) -> Result<usize, sqlx::Error> {
        let alerts = AlertsRepository::fetch_active(&self.pool, AlertType::Price).await?;
        let snapshot = self.cache.snapshot();
        let mut triggered = 0;

        for alert in &alerts {
            let AlertCondition::Price {
                direction,
                target_price,
            } = alert.condition
            else {
                continue;
            };
            let Some(price) = snapshot.get(&alert.symbol).map(|s| s.last_price) else {
                continue;
            };
            if !price_condition_met(direction, target_price, price) {
                continue;
            }

            let message = price_message(&alert.symbol, direction, target_price, price);
            match self.publisher.trigger(alert, price, message).await {
                Ok(Some(_)) => triggered += 1,
                Ok(None) => {}
                Err(e) => error!("Failed to trigger alert {}: {}", alert.id, e),
            }
        }

        Ok(triggered)
    }
}
