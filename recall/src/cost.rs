//! Per-user daily spend tracking and reporting.
//!
//! Costs are estimates derived from request shape, not measured API token
//! usage. Trackers are keyed by `{user}_{local-date}`; the date string uses
//! the process's local calendar day, so bucket boundaries follow the host
//! timezone. Trackers for days older than [`PRUNE_AFTER_DAYS`] are dropped
//! whenever a new day's tracker is first created, which keeps a long-running
//! process from accumulating unbounded history.

use chrono::{DateTime, Local, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::context::AnalysisRequest;

const BASE_PROMPT_TOKENS: f64 = 1500.0;
const TOKENS_PER_FOCUS_TAG: f64 = 200.0;
const RESPONSE_TOKENS: f64 = 800.0;
const COST_PER_TOKEN: f64 = 0.000015;

/// Days of per-user history kept before pruning.
const PRUNE_AFTER_DAYS: i64 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Estimated cost of one fresh analysis, in dollars.
///
/// Deterministic in the request shape: a fixed prompt base, a per-tag
/// increment, and a fixed response allowance.
pub fn estimate_cost(request: &AnalysisRequest) -> f64 {
    let tokens = BASE_PROMPT_TOKENS + TOKENS_PER_FOCUS_TAG * request.focus_tags.len() as f64 + RESPONSE_TOKENS;
    tokens * COST_PER_TOKEN
}

/// Accumulated spend for one user on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCostTracker {
    pub user_id: String,
    pub date: String,
    pub total_cost: f64,
    pub request_count: u64,
    pub last_update: DateTime<Utc>,
}

/// Aggregate of today's trackers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCostReport {
    pub date: String,
    pub total_cost: f64,
    pub average_cost_per_user: f64,
    pub total_requests: u64,
    pub active_users: usize,
    /// Spend relative to the combined per-user budget; 1.0 means the day's
    /// allowance is fully consumed.
    pub budget_utilization: f64,
}

/// In-memory ledger of [`DailyCostTracker`] entries.
pub struct CostLedger {
    trackers: DashMap<String, DailyCostTracker>,
    daily_budget: f64,
}

impl CostLedger {
    /// `daily_budget` is the per-user daily allowance in dollars; crossing it
    /// logs a warning but does not block further spend.
    pub fn new(daily_budget: f64) -> Self {
        Self {
            trackers: DashMap::new(),
            daily_budget,
        }
    }

    /// Record `cost` against `user_id`'s tracker for today, creating the
    /// tracker on the user's first request of the day.
    pub fn track(&self, user_id: &str, cost: f64) {
        let date = today_string();
        let key = format!("{user_id}_{date}");
        let is_new_day = !self.trackers.contains_key(&key);

        {
            let mut tracker = self.trackers.entry(key).or_insert_with(|| DailyCostTracker {
                user_id: user_id.to_string(),
                date: date.clone(),
                total_cost: 0.0,
                request_count: 0,
                last_update: Utc::now(),
            });
            tracker.total_cost += cost;
            tracker.request_count += 1;
            tracker.last_update = Utc::now();

            if tracker.total_cost > self.daily_budget {
                tracing::warn!(
                    user_id = %tracker.user_id,
                    total_cost = tracker.total_cost,
                    daily_budget = self.daily_budget,
                    "daily analysis budget exceeded"
                );
            }
        }

        if is_new_day {
            self.prune_stale_days();
        }
    }

    /// Aggregate today's trackers into a [`DailyCostReport`].
    pub fn daily_report(&self) -> DailyCostReport {
        let date = today_string();
        let mut total_cost = 0.0;
        let mut total_requests = 0;
        let mut active_users = 0;

        for tracker in self.trackers.iter().filter(|t| t.date == date) {
            total_cost += tracker.total_cost;
            total_requests += tracker.request_count;
            active_users += 1;
        }

        let (average_cost_per_user, budget_utilization) = if active_users == 0 {
            (0.0, 0.0)
        } else {
            (
                total_cost / active_users as f64,
                total_cost / (active_users as f64 * self.daily_budget),
            )
        };

        DailyCostReport {
            date,
            total_cost,
            average_cost_per_user,
            total_requests,
            active_users,
            budget_utilization,
        }
    }

    /// Drop trackers older than [`PRUNE_AFTER_DAYS`] local days. Unparseable
    /// dates are kept rather than silently discarded.
    fn prune_stale_days(&self) {
        let cutoff = Local::now().date_naive() - chrono::Duration::days(PRUNE_AFTER_DAYS);
        self.trackers.retain(|_, tracker| {
            NaiveDate::parse_from_str(&tracker.date, DATE_FORMAT).map_or(true, |d| d >= cutoff)
        });
    }

    pub fn clear(&self) {
        self.trackers.clear();
    }
}

fn today_string() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EnergyTrend;

    fn request_with_tags(tags: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            energy_level: 50.0,
            energy_trend: EnergyTrend::Stable,
            time_of_day: "morning".to_string(),
            focus_tags: tags.iter().map(|t| t.to_string()).collect(),
            humidity: 50.0,
            pressure_trend: 0.0,
        }
    }

    #[test]
    fn estimate_scales_with_tag_count() {
        let none = estimate_cost(&request_with_tags(&[]));
        let two = estimate_cost(&request_with_tags(&["sleep", "hydration"]));
        assert!((none - 2300.0 * 0.000015).abs() < 1e-12);
        assert!((two - 2700.0 * 0.000015).abs() < 1e-12);
    }

    #[test]
    fn repeated_tracking_accumulates() {
        let ledger = CostLedger::new(0.10);
        ledger.track("u1", 0.03);
        ledger.track("u1", 0.03);
        ledger.track("u1", 0.03);

        let report = ledger.daily_report();
        assert!((report.total_cost - 0.09).abs() < 1e-9);
        assert_eq!(report.total_requests, 3);
        assert_eq!(report.active_users, 1);
        assert!((report.average_cost_per_user - 0.09).abs() < 1e-9);
    }

    #[test]
    fn budget_utilization_spans_all_active_users() {
        let ledger = CostLedger::new(0.10);
        ledger.track("u1", 0.10);
        ledger.track("u2", 0.10);

        let report = ledger.daily_report();
        assert_eq!(report.active_users, 2);
        assert!((report.budget_utilization - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_ledger_reports_zeroes() {
        let report = CostLedger::new(0.10).daily_report();
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.active_users, 0);
        assert_eq!(report.average_cost_per_user, 0.0);
        assert_eq!(report.budget_utilization, 0.0);
    }
}
