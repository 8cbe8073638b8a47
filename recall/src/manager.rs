//! Three-tier cache lookup orchestration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::context::{AnalysisRequest, AnalysisResponse};
use crate::cost::{estimate_cost, CostLedger, DailyCostReport};
use crate::similarity::{is_context_similar, similarity};
use crate::store::{CachedAnalysis, TieredStore};

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceSource {
    MemoryCache,
    AdaptedCache,
    FreshAnalysis,
}

/// Result of a cache lookup: the analysis, where it came from, and the cost
/// incurred (0 for either cached tier).
#[derive(Debug, Clone)]
pub struct CacheOutcome {
    pub analysis: AnalysisResponse,
    pub source: AdviceSource,
    pub cost: f64,
}

/// Thresholds and lifetimes for [`AnalysisCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to freshly computed entries.
    pub fresh_ttl: Duration,
    /// `is_context_similar` threshold for serving an exact key hit.
    pub exact_match_threshold: f64,
    /// Minimum full-scorer similarity for an entry to be considered at all
    /// in the adapted tier.
    pub similarity_floor: f64,
    /// Minimum similarity the best candidate must still clear to be adapted.
    pub adapt_min_similarity: f64,
    /// Maximum age of an entry eligible for adaptation.
    pub adapt_max_age: Duration,
    /// Per-user daily spend allowance, dollars.
    pub daily_budget: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: Duration::from_secs(3600),
            exact_match_threshold: 0.95,
            similarity_floor: 0.7,
            adapt_min_similarity: 0.6,
            adapt_max_age: Duration::from_secs(4 * 3600),
            daily_budget: 0.10,
        }
    }
}

/// Similarity-aware cache in front of an expensive analysis backend.
///
/// Lookups try the exact tier, then the adapted tier, then run the
/// caller-supplied fresh computation (see the crate docs for tier semantics).
/// Concurrent misses for the same cache key are coalesced through a per-key
/// async lock: the first caller computes, the rest re-check the cache once
/// the lock frees and normally land an exact hit instead of triggering a
/// redundant paid computation.
///
/// The cache is a plain value meant to be constructed by whatever service
/// composes it and shared behind an `Arc`; there is no global instance.
pub struct AnalysisCache {
    store: TieredStore,
    ledger: CostLedger,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    config: CacheConfig,
}

impl AnalysisCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: TieredStore::new(),
            ledger: CostLedger::new(config.daily_budget),
            in_flight: DashMap::new(),
            config,
        }
    }

    /// Serve `request` from cache or fall through to `compute_fresh`.
    ///
    /// Errors from `compute_fresh` propagate unmodified: nothing is cached,
    /// no cost is recorded, and no retry is attempted here. Fresh results are
    /// billed to `user_id`'s daily ledger before being cached.
    pub async fn get_analysis<F, Fut, E>(
        &self,
        user_id: &str,
        request: &AnalysisRequest,
        compute_fresh: F,
    ) -> Result<CacheOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnalysisResponse, E>>,
    {
        let key = request.cache_key();

        if let Some(outcome) = self.lookup_cached(&key, request) {
            return Ok(outcome);
        }

        // Coalesce concurrent misses on the same key: one caller computes
        // while the rest queue here and re-check the cache afterwards.
        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // The gate entry must come out of the map on every exit path,
        // including compute errors; keys embed client-supplied strings, so a
        // leaked entry per failed context would grow without bound. Declared
        // before the lock guard so the lock is released first.
        let _unregister = scopeguard::guard((), |_| {
            self.in_flight.remove(&key);
        });
        let _guard = gate.lock().await;

        if let Some(outcome) = self.lookup_cached(&key, request) {
            return Ok(outcome);
        }

        let fresh = compute_fresh().await?;
        let cost = estimate_cost(request);
        self.ledger.track(user_id, cost);
        self.store.put(key.clone(), fresh.clone(), request.clone(), self.config.fresh_ttl);
        tracing::debug!(%key, user_id, cost, "cached fresh analysis");

        Ok(CacheOutcome {
            analysis: fresh,
            source: AdviceSource::FreshAnalysis,
            cost,
        })
    }

    /// Exact tier, then adapted tier. `None` means the caller must compute.
    fn lookup_cached(&self, key: &str, request: &AnalysisRequest) -> Option<CacheOutcome> {
        if let Some(entry) = self.store.get(key) {
            if is_context_similar(&entry.original_request, request, self.config.exact_match_threshold) {
                tracing::debug!(%key, "serving exact cache hit");
                return Some(CacheOutcome {
                    analysis: entry.analysis.with_refreshed_timestamp(),
                    source: AdviceSource::MemoryCache,
                    cost: 0.0,
                });
            }
        }

        let mut best: Option<(f64, CachedAnalysis)> = None;
        for entry in self.store.all_entries() {
            let score = similarity(request, &entry.original_request);
            if score > self.config.similarity_floor && best.as_ref().map_or(true, |(b, _)| score > *b) {
                best = Some((score, entry));
            }
        }

        if let Some((score, entry)) = best {
            if self.can_adapt(&entry, score) {
                tracing::debug!(candidate_key = %entry.cache_key, score, "adapting similar cache entry");
                return Some(CacheOutcome {
                    analysis: entry.analysis.with_refreshed_timestamp(),
                    source: AdviceSource::AdaptedCache,
                    cost: 0.0,
                });
            }
        }

        None
    }

    fn can_adapt(&self, entry: &CachedAnalysis, score: f64) -> bool {
        let age = Utc::now().signed_duration_since(entry.created_at);
        let fresh_enough = age.to_std().map_or(false, |age| age < self.config.adapt_max_age);
        fresh_enough && score > self.config.adapt_min_similarity
    }

    /// Aggregate of today's recorded spend.
    pub fn daily_report(&self) -> DailyCostReport {
        self.ledger.daily_report()
    }

    pub fn cached_entries(&self) -> usize {
        self.store.len()
    }

    /// Drop every cache entry, pending eviction timer, and cost tracker.
    /// Call at shutdown or between tests sharing an instance.
    pub fn clear(&self) {
        self.store.clear();
        self.ledger.clear();
        self.in_flight.clear();
    }
}
