use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use common::models::StreamEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::feed_cache::FeedCache;

pub const SUBSCRIBER_BUFFER: usize = 64;

/// Fan-out of serialized stream events to downstream subscribers.
///
/// Publishing never waits on a subscriber. A closed receiver is dropped from
/// the set on the publish that notices it; a full one just misses that frame.
#[derive(Debug)]
pub struct SubscriberHub {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<String>>>,
    buffer: usize,
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new(SUBSCRIBER_BUFFER)
    }
}

impl SubscriberHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Registers a subscriber, primed with the current status and, if any
    /// symbol has been seen, a tickers frame.
    pub fn subscribe(&self, cache: &FeedCache) -> (Uuid, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let mut greeting = vec![StreamEvent::Status {
            connected: cache.is_connected(),
        }];
        if !cache.is_empty() {
            greeting.push(StreamEvent::Tickers { data: cache.all() });
        }
        for event in greeting {
            if let Some(text) = Self::encode(&event) {
                let _ = tx.try_send(text);
            }
        }

        self.lock().insert(id, tx);
        debug!("Subscriber {} connected", id);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        self.lock().remove(id);
    }

    /// Returns how many subscribers accepted the frame.
    pub fn publish(&self, event: &StreamEvent) -> usize {
        let Some(text) = Self::encode(event) else {
            return 0;
        };

        let mut subscribers = self.lock();
        let mut delivered = 0;
        subscribers.retain(|id, tx| match tx.try_send(text.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber {} is lagging, frame skipped", id);
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Subscriber {} gone, pruning", id);
                false
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, mpsc::Sender<String>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encode(event: &StreamEvent) -> Option<String> {
        match event.to_json() {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to encode stream event: {}", e);
                None
            }
        }
    }
}
