use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use market_data::{FeedCache, SubscriberHub};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FeedCache>,
    pub hub: Arc<SubscriberHub>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Stream endpoint listening on ws://{}/ws", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "connected": state.cache.is_connected(),
        "symbols": state.cache.len(),
        "subscribers": state.hub.len(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forwards hub frames until the client goes away. The hub notices the
/// dropped receiver on its next publish.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut frames) = state.hub.subscribe(&state.cache);
    let (mut sender, mut receiver) = socket.split();

    let forward_task = tokio::spawn(async move {
        while let Some(text) = frames.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    debug!("Subscriber {} disconnected", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{PriceSnapshot, StreamEvent};
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    async fn next_json(
        stream: &mut (impl futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
                  + Unpin),
    ) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn websocket_clients_get_greeting_and_broadcasts() {
        let cache = Arc::new(FeedCache::new());
        cache.set_connected(true);
        cache.upsert(PriceSnapshot {
            symbol: "BTCUSDT".into(),
            last_price: 64_000.0,
            open_price: 63_000.0,
            high: 64_500.0,
            low: 62_900.0,
            volume: 10.0,
            quote_volume: 640_000.0,
            change_percent: 1.5873,
            updated_at: 1,
        });
        let hub = Arc::new(SubscriberHub::default());
        let state = AppState {
            cache: cache.clone(),
            hub: hub.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });

        let (mut client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let status = next_json(&mut client).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["connected"], true);
        let tickers = next_json(&mut client).await;
        assert_eq!(tickers["type"], "tickers");
        assert_eq!(tickers["data"][0]["lastPrice"], 64_000.0);

        hub.publish(&StreamEvent::Status { connected: false });
        let update = next_json(&mut client).await;
        assert_eq!(update["connected"], false);
    }
}
