//! Context-similarity caching for expensive analysis calls.
//!
//! `recall` sits between a request handler and an LLM (or any other costly
//! analysis backend) and decides whether a new request is close enough to a
//! previously answered one to reuse the stored result. Lookups fall through
//! three tiers, each strictly cheaper than the next:
//!
//! 1. **Exact**: the request's bucketed context key already has a live entry
//!    and the stored context is a near-duplicate of the incoming one.
//! 2. **Adapted**: no exact hit, but some live entry's context scores above a
//!    similarity floor under a weighted multi-dimension scorer.
//! 3. **Fresh**: the caller-supplied computation runs, its estimated cost is
//!    recorded against the user's daily ledger, and the result is cached with
//!    a TTL.
//!
//! Entries expire through one scheduled eviction task per cache key;
//! overwriting a key cancels the stale task so a late-firing timer can never
//! delete a newer entry. All state is in-memory and process-lifetime only.
//!
//! The entry point is [`AnalysisCache`]:
//!
//! ```ignore
//! let cache = AnalysisCache::new(CacheConfig::default());
//! let outcome = cache
//!     .get_analysis("user-42", &request, || async { backend.analyze(&request).await })
//!     .await?;
//! println!("{:?} cost {}", outcome.source, outcome.cost);
//! ```

pub mod context;
pub mod cost;
pub mod manager;
pub mod similarity;
pub mod store;

pub use context::{AnalysisRequest, AnalysisResponse, EnergyTrend};
pub use cost::{estimate_cost, CostLedger, DailyCostReport, DailyCostTracker};
pub use manager::{AdviceSource, AnalysisCache, CacheConfig, CacheOutcome};
pub use similarity::{is_context_similar, similarity};
pub use store::{CachedAnalysis, TieredStore};
