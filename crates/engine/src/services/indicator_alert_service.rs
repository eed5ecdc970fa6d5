use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::{AlertCondition, AlertType, PriceAlert};
use futures_util::future::join_all;
use market_data::services::IndicatorCache;
use storage::SqlitePool;
use storage::repositories::AlertsRepository;
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info};

use crate::alerts::{band_touched, indicator_message};
use crate::services::AlertPublisher;

/// Band alerts, evaluated once per (symbol, interval) group.
pub struct IndicatorAlertService {
    pool: SqlitePool,
    indicators: Arc<IndicatorCache>,
    publisher: AlertPublisher,
    interval: Duration,
}

#[async_trait]
impl Actor for IndicatorAlertService {
    fn name(&self) -> ActorType {
        ActorType::IndicatorAlertActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());
        info!("Starting indicator alert scanner every {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_tick().await {
                error!("Indicator alert scan failed: {}", e);
                supervisor_tx
                    .send(ControlMessage::Error(
                        self.name(),
                        format!("Indicator alert scan failed: {}", e),
                    ))
                    .await?;
            }
        }
    }
}

impl IndicatorAlertService {
    pub fn new(
        pool: SqlitePool,
        indicators: Arc<IndicatorCache>,
        publisher: AlertPublisher,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            indicators,
            publisher,
            interval,
        }
    }

    pub async fn run_tick(&self) -> Result<usize, sqlx::Error> {
        let alerts = AlertsRepository::fetch_active(&self.pool, AlertType::Indicator).await?;

        let mut groups: BTreeMap<(String, String), Vec<&PriceAlert>> = BTreeMap::new();
        for alert in &alerts {
            if let AlertCondition::Indicator { chart_interval, .. } = &alert.condition {
                groups
                    .entry((alert.symbol.clone(), chart_interval.clone()))
                    .or_default()
                    .push(alert);
            }
        }

        // Each group waits on its own closes fetch.
        let evaluations = groups
            .into_iter()
            .map(|((symbol, interval), members)| self.evaluate_group(symbol, interval, members));
        let triggered: usize = join_all(evaluations).await.into_iter().sum();

        Ok(triggered)
    }

    async fn evaluate_group(
        &self,
        symbol: String,
        interval: String,
        members: Vec<&PriceAlert>,
    ) -> usize {
        let Some(band) = self.indicators.bands(&symbol, &interval).await else {
            debug!("Not enough closes for {} {}, skipping", symbol, interval);
            return 0;
        };
        let price = band.last_close;

        let mut triggered = 0;
        for alert in members {
            let AlertCondition::Indicator {
                indicator_condition,
                ..
            } = alert.condition
            else {
                continue;
            };
            let Some(band_value) = band_touched(indicator_condition, &band, price) else {
                continue;
            };

            let message =
                indicator_message(&symbol, indicator_condition, &interval, price, band_value);
            match self.publisher.trigger(alert, price, message).await {
                Ok(Some(_)) => triggered += 1,
                Ok(None) => {}
                Err(e) => error!("Failed to trigger alert {}: {}", alert.id, e),
            }
        }
        triggered
    }
}
