use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, time};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::StreamEvent,
};

use crate::{
    broadcast::SubscriberHub,
    feed_cache::FeedCache,
    remote::{combined_stream_url, parse_feed_message},
};

/// Keeps one combined miniTicker subscription open for every tracked symbol
/// and overwrites the feed cache from it.
pub struct FeedGateway {
    symbols: Vec<String>,
    ws_base_url: String,
    reconnect: Duration,
    cache: Arc<FeedCache>,
    hub: Arc<SubscriberHub>,
}

#[async_trait]
impl Actor for FeedGateway {
    fn name(&self) -> ActorType {
        ActorType::FeedGatewayActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat = self.spawn_heartbeat(supervisor_tx.clone());
        let result = self.stream(&supervisor_tx).await;
        heartbeat.abort();
        result
    }
}

impl FeedGateway {
    pub fn new(
        symbols: &[String],
        ws_base_url: &str,
        reconnect: Duration,
        cache: Arc<FeedCache>,
        hub: Arc<SubscriberHub>,
    ) -> Self {
        Self {
            symbols: symbols.to_vec(),
            ws_base_url: ws_base_url.to_string(),
            reconnect,
            cache,
            hub,
        }
    }

    /// Connect/read loop. Strictly sequential, so at most one reconnect is
    /// ever pending.
    async fn stream(&self, supervisor_tx: &mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let url = combined_stream_url(&self.ws_base_url, &self.symbols)?;
        info!("Connecting to: {}", url);

        loop {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("Feed connected ({} symbols)", self.symbols.len());
                    self.mark_connected(true);
                    let (mut write, mut read) = ws_stream.split();

                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                Self::ingest(&self.cache, text.as_str());
                            }
                            Ok(Message::Ping(pg)) => {
                                if let Err(e) = write.send(Message::Pong(pg)).await {
                                    warn!("Failed to answer ping: {}", e);
                                    break;
                                }
                                debug!("Ping - Pong message sent to websocket.");
                            }
                            Ok(Message::Close(frame)) => {
                                info!("Feed closed by remote: {:?}", frame);
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!("WebSocket error: {}", e);
                                supervisor_tx
                                    .send(ControlMessage::Error(
                                        self.name(),
                                        format!("WebSocket error: {}", e),
                                    ))
                                    .await?;
                                break;
                            }
                        }
                    }

                    self.mark_connected(false);
                }
                Err(e) => {
                    error!(
                        "Connection failed: {}. Retrying in {}s...",
                        e,
                        self.reconnect.as_secs_f64()
                    );
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            format!("Connection failed: {}", e),
                        ))
                        .await?;
                    self.mark_connected(false);
                }
            }

            time::sleep(self.reconnect).await;
        }
    }

    /// Applies one feed frame to the cache. Malformed frames leave it untouched.
    pub fn ingest(cache: &FeedCache, text: &str) -> bool {
        match parse_feed_message(text) {
            Ok(snapshot) => {
                cache.upsert(snapshot);
                true
            }
            Err(e) => {
                warn!("Dropped feed message: {}", e);
                false
            }
        }
    }

    fn mark_connected(&self, connected: bool) {
        if self.cache.set_connected(connected) {
            if connected {
                info!("Feed status: connected");
            } else {
                warn!("Feed status: disconnected");
            }
            self.hub.publish(&StreamEvent::Status { connected });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const TICK: &str = r#"{"stream":"btcusdt@miniTicker","data":{"s":"BTCUSDT","c":"101.5","o":"100","h":"102","l":"99","v":"1","q":"101.5"}}"#;

    #[test]
    fn malformed_frames_leave_cache_untouched() {
        let cache = FeedCache::new();
        assert!(FeedGateway::ingest(&cache, TICK));
        let before = cache.get("BTCUSDT");

        assert!(!FeedGateway::ingest(&cache, r#"{"s":"BTCUSDT","c":"oops"}"#));
        assert!(!FeedGateway::ingest(&cache, "{"));
        assert!(!FeedGateway::ingest(&cache, r#"{"result":null,"id":1}"#));

        assert_eq!(cache.get("BTCUSDT"), before);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn reconnects_and_reports_status_edges() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First session: one tick, then a close frame.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(TICK.into())).await.unwrap();
            ws.close(None).await.unwrap();
            drop(ws);

            // Second session stays open.
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            std::future::pending::<()>().await;
            drop(ws);
        });

        let cache = Arc::new(FeedCache::new());
        let hub = Arc::new(SubscriberHub::default());
        let (_, mut events) = hub.subscribe(&cache);

        let mut gateway = FeedGateway::new(
            &["BTCUSDT".to_string()],
            &format!("ws://{}/stream?streams=", addr),
            Duration::from_millis(50),
            cache.clone(),
            hub.clone(),
        );
        let (supervisor_tx, _supervisor_rx) = mpsc::channel(64);
        let gateway_task = tokio::spawn(async move { gateway.run(supervisor_tx).await });

        let mut statuses = Vec::new();
        time::timeout(Duration::from_secs(5), async {
            while statuses.len() < 4 {
                let frame = events.recv().await.unwrap();
                let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
                statuses.push(value["connected"].as_bool().unwrap());
            }
        })
        .await
        .expect("status edges within timeout");

        assert_eq!(statuses, vec![false, true, false, true]);
        assert_eq!(cache.price("BTCUSDT"), Some(101.5));
        assert!(cache.is_connected());

        gateway_task.abort();
        server.abort();
    }
}
