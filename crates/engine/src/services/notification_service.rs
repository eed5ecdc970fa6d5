use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::Notification;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::notify::Notifier;

/// Drains the notification channel into a [`Notifier`].
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    rx: broadcast::Receiver<Notification>,
}

#[async_trait]
impl Actor for NotificationService {
    fn name(&self) -> ActorType {
        ActorType::NotificationActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());
        info!("Starting notification service");

        loop {
            match self.rx.recv().await {
                Ok(notification) => {
                    self.dispatch(&notification).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Notification service lagged behind. Missed {} messages.", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    supervisor_tx
                        .send(ControlMessage::Shutdown(self.name()))
                        .await?;
                    bail!("Notification channel closed unexpectedly.");
                }
            }
        }
    }
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, rx: broadcast::Receiver<Notification>) -> Self {
        Self { notifier, rx }
    }

    /// Failures are logged only; the alert has already been recorded.
    pub async fn dispatch(&self, notification: &Notification) -> bool {
        match self
            .notifier
            .send_text(&notification.address, &notification.text)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to deliver notification to {}: {}",
                    notification.address, e
                );
                false
            }
        }
    }
}
