use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before cached metadata (profile + standings) counts as stale.
/// Standings move quickly while an elimination event runs; anything longer
/// leaves the dashboard visibly behind the site.
pub const META_REFRESH_SECS: i64 = 30;

/// Seconds before a cached team roster counts as stale.
pub const TEAM_REFRESH_SECS: i64 = 30;

/// Minimum seconds between fetch attempts for the same entry, forced or not.
/// The attempt clock starts when a session starts, whatever its outcome, so
/// a failing entry backs off at this floor instead of hammering the API.
pub const MIN_FETCH_SECS: i64 = 10;

/// A cached value plus the instant its refresh session started applying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::stamped(data, Utc::now())
    }

    pub fn stamped(data: T, fetched_at: DateTime<Utc>) -> Self {
        Self { data, fetched_at }
    }

    /// Whether this entry is due for a refresh at `now`.
    ///
    /// An entry exactly `max_age_secs` old is already stale, and staleness
    /// never un-happens as `now` advances; only a rewrite resets it.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        now.signed_duration_since(self.fetched_at) >= Duration::seconds(max_age_secs)
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.fetched_at).num_seconds()
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let secs = self.age_secs(now);
        if secs < 1 {
            // Covers clock skew as well
            "just now".to_string()
        } else if secs < 60 {
            format!("{}s ago", secs)
        } else if secs < 3600 {
            format!("{}m ago", secs / 60)
        } else {
            format!("{}h ago", secs / 3600)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
