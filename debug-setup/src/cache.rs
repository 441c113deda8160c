//! Detection result cache
//!
//! Holds at most one [`DetectionSnapshot`]. Reads, full replacement and
//! per-tool updates all take the same lock, so a forced re-detection racing
//! a single-tool re-detection cannot lose either write.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::detect::{DetectionSnapshot, ToolKind};

pub struct ResultCache {
    snapshot: Mutex<Option<DetectionSnapshot>>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot: Mutex::new(None),
            clock,
        }
    }

    pub async fn get_cached(&self) -> Option<DetectionSnapshot> {
        self.snapshot.lock().await.clone()
    }

    pub async fn set_cached(&self, snapshot: DetectionSnapshot) {
        debug!("Caching detection snapshot completed at {}", snapshot.completed_at);
        *self.snapshot.lock().await = Some(snapshot);
    }

    /// True iff a snapshot exists and is younger than `ttl`
    pub async fn is_valid(&self, ttl: Duration) -> bool {
        self.valid_snapshot(ttl).await.is_some()
    }

    /// The cached snapshot if it is still within `ttl`
    pub async fn valid_snapshot(&self, ttl: Duration) -> Option<DetectionSnapshot> {
        let now = self.clock.now();
        let guard = self.snapshot.lock().await;
        guard
            .as_ref()
            .filter(|s| now - s.completed_at < ttl)
            .cloned()
    }

    /// Replace only the `tools` entries of the cached snapshot with those from
    /// `partial`, creating an empty snapshot first if none exists. Returns the
    /// merged snapshot.
    pub async fn update_specific(&self, partial: &DetectionSnapshot, tools: &[ToolKind]) -> DetectionSnapshot {
        let mut guard = self.snapshot.lock().await;
        let mut merged = guard
            .take()
            .unwrap_or_else(|| DetectionSnapshot::empty(partial.completed_at));
        for kind in tools {
            merged.set(*kind, partial.get(*kind).clone());
        }
        merged.completed_at = partial.completed_at;
        debug!("Updated cached entries for {:?}", tools);
        *guard = Some(merged.clone());
        merged
    }

    pub async fn clear(&self) {
        *self.snapshot.lock().await = None;
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
