//! In-memory cache store with per-key scheduled eviction.
//!
//! Entries live in a concurrent map and are removed by a tokio task scheduled
//! at insertion time. Overwriting a key aborts the previous key's eviction
//! task before the new entry's task is live; a late-firing stale task must
//! never delete a newer entry, so evictions additionally check that the exact
//! insertion they were scheduled for is still the one present.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::context::{AnalysisRequest, AnalysisResponse};

/// A cached analysis together with the context that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CachedAnalysis {
    pub analysis: AnalysisResponse,
    /// Kept for later similarity comparisons against incoming requests.
    pub original_request: AnalysisRequest,
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
    /// Fixed at insertion: `created_at + ttl`. No sliding expiration.
    pub expires_at: DateTime<Utc>,
}

struct Slot {
    entry: CachedAnalysis,
    /// Identifies this insertion so a stale eviction task can recognise that
    /// the key has since been overwritten.
    insertion: Uuid,
    eviction: tokio::task::JoinHandle<()>,
}

/// Concurrent key -> [`CachedAnalysis`] store. At most one live entry exists
/// per key; inserts are last-write-wins with no merging.
///
/// Cloning is cheap and shares the underlying map.
#[derive(Clone, Default)]
pub struct TieredStore {
    slots: Arc<DashMap<String, Slot>>,
}

impl TieredStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CachedAnalysis> {
        self.slots.get(key).map(|slot| slot.entry.clone())
    }

    /// Insert or overwrite the entry under `key`, scheduling its eviction at
    /// `now + ttl`. Any eviction task pending for the displaced entry is
    /// aborted.
    pub fn put(&self, key: String, analysis: AnalysisResponse, original_request: AnalysisRequest, ttl: Duration) {
        let created_at = Utc::now();
        let entry = CachedAnalysis {
            analysis,
            original_request,
            cache_key: key.clone(),
            created_at,
            expires_at: created_at + chrono::Duration::seconds(ttl.as_secs() as i64),
        };

        let insertion = Uuid::new_v4();
        let slots = Arc::clone(&self.slots);
        let evict_key = key.clone();
        let eviction = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let evicted = slots.remove_if(&evict_key, |_, slot| slot.insertion == insertion);
            if evicted.is_some() {
                tracing::debug!(key = %evict_key, "evicted expired analysis");
            }
        });

        if let Some(displaced) = self.slots.insert(key, Slot { entry, insertion, eviction }) {
            displaced.eviction.abort();
        }
    }

    /// Snapshot of every live entry. Iteration order is unspecified.
    pub fn all_entries(&self) -> Vec<CachedAnalysis> {
        self.slots.iter().map(|slot| slot.entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every entry and abort every pending eviction task. Call at
    /// teardown so no timers outlive the owning service.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.eviction.abort();
        }
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EnergyTrend;
    use serde_json::json;

    fn sample_request() -> AnalysisRequest {
        AnalysisRequest {
            energy_level: 55.0,
            energy_trend: EnergyTrend::Stable,
            time_of_day: "morning".to_string(),
            focus_tags: ["sleep"].into_iter().map(String::from).collect(),
            humidity: 60.0,
            pressure_trend: -1.0,
        }
    }

    fn response(label: &str) -> AnalysisResponse {
        AnalysisResponse::new(json!({ "summary": label }))
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_evicted_after_ttl() {
        let store = TieredStore::new();
        store.put("k".to_string(), response("a"), sample_request(), Duration::from_secs(1));
        assert!(store.get("k").is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        assert!(store.get("k").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_survives_until_ttl() {
        let store = TieredStore::new();
        store.put("k".to_string(), response("a"), sample_request(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(9)).await;
        tokio::task::yield_now().await;
        assert!(store.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_cancels_the_stale_eviction_timer() {
        let store = TieredStore::new();
        store.put("k".to_string(), response("first"), sample_request(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(2)).await;
        store.put("k".to_string(), response("second"), sample_request(), Duration::from_secs(10));

        // Past the first entry's 10s mark; only the second entry's timer
        // (due at t=12s) should still exist.
        tokio::time::sleep(Duration::from_secs(9)).await;
        tokio::task::yield_now().await;
        let entry = store.get("k").expect("second entry evicted by a stale timer");
        assert_eq!(entry.analysis.advice, json!({ "summary": "second" }));

        // And the second timer still fires on its own schedule.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        assert!(store.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_empties_the_store_and_cancels_timers() {
        let store = TieredStore::new();
        store.put("a".to_string(), response("a"), sample_request(), Duration::from_secs(1));
        store.put("b".to_string(), response("b"), sample_request(), Duration::from_secs(1));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());

        // Nothing left for the aborted timers to fire on.
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expires_at_is_fixed_at_insertion() {
        let store = TieredStore::new();
        store.put("k".to_string(), response("a"), sample_request(), Duration::from_secs(3600));
        let entry = store.get("k").unwrap();
        assert_eq!(entry.expires_at - entry.created_at, chrono::Duration::seconds(3600));
    }
}
