//! Similarity scoring between analysis contexts.
//!
//! Two measures with different jobs:
//!
//! - [`similarity`] is the full weighted scorer used to rank every live cache
//!   entry against an incoming request when no exact key hit exists.
//! - [`is_context_similar`] is a cheaper difference-averaging check used only
//!   to confirm that an exact key hit really is a near-duplicate; it is meant
//!   for high thresholds (0.95), not for ranking.

use crate::context::AnalysisRequest;
use std::collections::BTreeSet;

const ENERGY_WEIGHT: f64 = 0.4;
const TIME_OF_DAY_WEIGHT: f64 = 0.2;
const TAG_OVERLAP_WEIGHT: f64 = 0.3;
const ENVIRONMENT_WEIGHT: f64 = 0.1;

/// Weighted similarity between two contexts, in `[0, 1]`.
///
/// Energy closeness carries weight 0.4, an exact time-of-day match 0.2, tag
/// overlap (Jaccard) 0.3, humidity closeness 0.1. The sum is normalized by the
/// applied weights, which always total 1.0 for this feature set; the clamp is
/// a defensive bound, not something reachable with valid inputs.
pub fn similarity(a: &AnalysisRequest, b: &AnalysisRequest) -> f64 {
    let mut score = 0.0;
    let mut factors = 0.0;

    score += (1.0 - (a.energy_level - b.energy_level).abs() / 100.0) * ENERGY_WEIGHT;
    factors += ENERGY_WEIGHT;

    if a.time_of_day == b.time_of_day {
        score += TIME_OF_DAY_WEIGHT;
    }
    factors += TIME_OF_DAY_WEIGHT;

    score += jaccard(&a.focus_tags, &b.focus_tags) * TAG_OVERLAP_WEIGHT;
    factors += TAG_OVERLAP_WEIGHT;

    score += (1.0 - (a.humidity - b.humidity).abs() / 100.0) * ENVIRONMENT_WEIGHT;
    factors += ENVIRONMENT_WEIGHT;

    (score / factors).clamp(0.0, 1.0)
}

/// Jaccard index of two tag sets. Defined as 0 when both sets are empty.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Near-duplicate check for the exact cache tier.
///
/// Averages three difference ratios (energy/100, humidity/100, pressure
/// trend/20) and compares `1 - avg` against the threshold. Coarser than
/// [`similarity`] on purpose: it only has to confirm that two requests which
/// already collided to the same bucketed key are interchangeable.
pub fn is_context_similar(a: &AnalysisRequest, b: &AnalysisRequest, threshold: f64) -> bool {
    let energy_diff = (a.energy_level - b.energy_level).abs() / 100.0;
    let humidity_diff = (a.humidity - b.humidity).abs() / 100.0;
    let pressure_diff = (a.pressure_trend - b.pressure_trend).abs() / 20.0;
    let avg_difference = (energy_diff + humidity_diff + pressure_diff) / 3.0;
    1.0 - avg_difference >= threshold
}
