//! Ephemeral per-customer state kept in the KV store (spec §3, §4.3).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const PROFILE_TTL_SECS: i64 = 86_400;
const PROFILE_RETENTION: Duration = Duration::hours(24);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionRecord {
    #[serde(rename = "adId")]
    pub ad_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "customerId")]
    pub customer_id: String,
    pub impressions: Vec<ImpressionRecord>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    /// Absence in the KV is semantically equivalent to this (spec §3).
    pub fn empty(customer_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            impressions: Vec::new(),
            last_updated: now,
        }
    }

    /// Appends an impression and drops entries older than 24h, preserving
    /// invariant I1: every remaining entry satisfies `now - timestamp <= 24h`.
    pub fn record(&mut self, ad_id: &str, now: DateTime<Utc>) {
        self.impressions.push(ImpressionRecord {
            ad_id: ad_id.to_string(),
            timestamp: now,
        });
        self.retain_recent(now);
        self.last_updated = now;
    }

    pub fn retain_recent(&mut self, now: DateTime<Utc>) {
        let cutoff = now - PROFILE_RETENTION;
        self.impressions.retain(|e| e.timestamp > cutoff);
    }

    /// Recent impressions of a specific ad within the last 24h, used by the
    /// frequency-cap filter (§4.4).
    pub fn history_for(&self, ad_id: &str, now: DateTime<Utc>) -> Vec<&ImpressionRecord> {
        let cutoff = now - PROFILE_RETENTION;
        self.impressions
            .iter()
            .filter(|e| e.ad_id == ad_id && e.timestamp > cutoff)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_drops_entries_older_than_24h() {
        let now = Utc::now();
        let mut profile = UserProfile::empty("c1", now - Duration::hours(30));
        profile.impressions.push(ImpressionRecord {
            ad_id: "old".into(),
            timestamp: now - Duration::hours(25),
        });
        profile.record("new", now);

        assert_eq!(profile.impressions.len(), 1);
        assert_eq!(profile.impressions[0].ad_id, "new");
    }

    #[test]
    fn history_for_filters_by_ad_and_recency() {
        let now = Utc::now();
        let mut profile = UserProfile::empty("c1", now);
        profile.impressions.push(ImpressionRecord {
            ad_id: "a".into(),
            timestamp: now - Duration::hours(1),
        });
        profile.impressions.push(ImpressionRecord {
            ad_id: "a".into(),
            timestamp: now - Duration::hours(25),
        });
        profile.impressions.push(ImpressionRecord {
            ad_id: "b".into(),
            timestamp: now - Duration::minutes(5),
        });

        let history = profile.history_for("a", now);
        assert_eq!(history.len(), 1);
    }
}
