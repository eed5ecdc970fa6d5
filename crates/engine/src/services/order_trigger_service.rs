use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use market_data::FeedCache;
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info};

use crate::error::OrderError;
use crate::services::OrderService;
use crate::trigger::{TriggerAction, evaluate};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    /// No snapshot for the symbol yet.
    pub skipped: usize,
    pub armed: usize,
    pub executed: usize,
    pub failed: usize,
}

/// Periodic scan of pending orders against the feed cache.
pub struct OrderTriggerService {
    orders: Arc<OrderService>,
    cache: Arc<FeedCache>,
    interval: Duration,
}

#[async_trait]
impl Actor for OrderTriggerService {
    fn name(&self) -> ActorType {
        ActorType::OrderTriggerActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());
        info!("Starting order trigger loop every {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_tick().await {
                Ok(report) if report.armed + report.executed + report.failed > 0 => {
                    info!("Order tick: {:?}", report);
                }
                Ok(report) => debug!("Order tick: {:?}", report),
                Err(e) => {
                    error!("Order tick failed: {}", e);
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            format!("Order tick failed: {}", e),
                        ))
                        .await?;
                }
            }
        }
    }
}

impl OrderTriggerService {
    pub fn new(orders: Arc<OrderService>, cache: Arc<FeedCache>, interval: Duration) -> Self {
        Self {
            orders,
            cache,
            interval,
        }
    }

    /// One pass over every pending order, all judged against the same snapshot.
    /// A failing order is logged and left pending for the next tick.
    pub async fn run_tick(&self) -> Result<TickReport, OrderError> {
        let orders = self.orders.pending_orders().await?;
        let snapshot = self.cache.snapshot();
        let mut report = TickReport {
            scanned: orders.len(),
            ..TickReport::default()
        };

        for order in &orders {
            let Some(price) = snapshot.get(&order.symbol).map(|s| s.last_price) else {
                report.skipped += 1;
                continue;
            };

            match evaluate(order, price) {
                TriggerAction::Hold => {}
                TriggerAction::Arm => match self.orders.arm_stop(order.id).await {
                    Ok(true) => {
                        report.armed += 1;
                        info!("Order {} armed at {} (stop reached)", order.id, price);
                    }
                    Ok(false) => debug!("Order {} no longer armable", order.id),
                    Err(e) => {
                        report.failed += 1;
                        error!("Failed to arm order {}: {}", order.id, e);
                    }
                },
                TriggerAction::Execute { price: fill_price } => {
                    match self.orders.execute_pending(order, fill_price).await {
                        Ok(Some(_)) => report.executed += 1,
                        Ok(None) => debug!("Order {} was closed before execution", order.id),
                        Err(e) => {
                            report.failed += 1;
                            error!("Order {} execution failed: {}", order.id, e);
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
