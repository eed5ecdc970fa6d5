use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use common::models::PriceSnapshot;

pub type Snapshots = Arc<HashMap<String, PriceSnapshot>>;

/// Latest snapshot per symbol.
///
/// Readers clone the inner `Arc` and drop the lock straight away, so a scan
/// works on a frozen view while the gateway keeps writing. The single writer
/// copies the map only when a reader still holds the previous view.
#[derive(Debug, Default)]
pub struct FeedCache {
    snapshots: RwLock<Snapshots>,
    connected: AtomicBool,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, snapshot: PriceSnapshot) {
        let mut guard = self
            .snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).insert(snapshot.symbol.clone(), snapshot);
    }

    pub fn snapshot(&self) -> Snapshots {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, symbol: &str) -> Option<PriceSnapshot> {
        self.snapshot().get(symbol).cloned()
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.snapshot().get(symbol).map(|s| s.last_price)
    }

    /// All snapshots ordered by symbol.
    pub fn all(&self) -> Vec<PriceSnapshot> {
        let mut all: Vec<PriceSnapshot> = self.snapshot().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Records the feed connection state. Returns true on an edge.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel) != connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
