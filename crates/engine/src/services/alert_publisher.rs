use std::sync::Arc;

use common::models::{AlertTriggered, Notification, PriceAlert, StreamEvent};
use market_data::SubscriberHub;
use storage::SqlitePool;
use storage::repositories::{AccountsRepository, AlertsRepository};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shared tail of both alert scanners: the one-way state flip, then fan-out.
#[derive(Clone)]
pub struct AlertPublisher {
    pool: SqlitePool,
    hub: Arc<SubscriberHub>,
    notifications: broadcast::Sender<Notification>,
}

impl AlertPublisher {
    pub fn new(
        pool: SqlitePool,
        hub: Arc<SubscriberHub>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            pool,
            hub,
            notifications,
        }
    }

    /// Returns the emitted event, or `None` when another path triggered the alert first.
    pub async fn trigger(
        &self,
        alert: &PriceAlert,
        price: f64,
        message: String,
    ) -> Result<Option<AlertTriggered>, sqlx::Error> {
        if !AlertsRepository::mark_triggered(&self.pool, alert.id, price).await? {
            debug!("Alert {} already triggered", alert.id);
            return Ok(None);
        }

        info!("Alert {} triggered: {}", alert.id, message);
        let event = AlertTriggered {
            alert_id: alert.id,
            user_id: alert.user_id,
            symbol: alert.symbol.clone(),
            current_price: price,
            alert_type: alert.alert_type(),
            message,
        };
        self.hub.publish(&StreamEvent::AlertTriggered {
            data: event.clone(),
        });

        if alert.notify_telegram {
            self.notify(alert.user_id, &event.message).await;
        }
        Ok(Some(event))
    }

    /// Delivery problems never undo the trigger.
    async fn notify(&self, user_id: i64, text: &str) {
        match AccountsRepository::telegram_chat_id(&self.pool, user_id).await {
            Ok(Some(address)) => {
                let notification = Notification {
                    address,
                    text: text.to_string(),
                };
                if self.notifications.send(notification).is_err() {
                    debug!("No notifier listening, dropped message for user {}", user_id);
                }
            }
            Ok(None) => debug!("User {} has no chat id, skipping notification", user_id),
            Err(e) => warn!("Chat id lookup failed for user {}: {}", user_id, e),
        }
    }
}
