//! Time-slot and frequency-cap filters (spec §4.4). Both return the
//! eligible subset and a diagnostic list of exclusions, so the orchestrator
//! can log why a candidate dropped out without re-deriving the reason.

use chrono::{DateTime, Utc};

use crate::config::settings::FrequencyCap;
use crate::domain::ad::{Ad, TimeSlot};
use crate::domain::profile::UserProfile;

#[derive(Debug, Clone)]
pub struct Exclusion {
    pub ad_id: String,
    pub reason: &'static str,
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub eligible: Vec<Ad>,
    pub excluded: Vec<Exclusion>,
}

/// An ad passes iff `timeSlots` is absent, empty, or contains the current
/// slot.
pub fn time_slot_filter(candidates: Vec<Ad>, now: DateTime<Utc>) -> FilterOutcome {
    let current = TimeSlot::of(now);
    let mut outcome = FilterOutcome::default();

    for ad in candidates {
        let passes = match &ad.time_slots {
            None => true,
            Some(slots) if slots.is_empty() => true,
            Some(slots) => slots.contains(&current),
        };

        if passes {
            outcome.eligible.push(ad);
        } else {
            outcome.excluded.push(Exclusion { ad_id: ad.id, reason: "time_slot" });
        }
    }

    outcome
}

/// Excludes `a` if it has `>= max_per_day` impressions in the last 24h, or
/// its most recent impression is younger than `cooldown`.
pub fn frequency_cap_filter(
    candidates: Vec<Ad>,
    profile: &UserProfile,
    cap: &FrequencyCap,
    now: DateTime<Utc>,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    let cooldown = chrono::Duration::seconds(cap.cooldown_secs);

    for ad in candidates {
        let history = profile.history_for(&ad.id, now);
        let count = history.len() as u32;
        let most_recent = history.iter().map(|e| e.timestamp).max();

        let over_cap = count >= cap.max_per_day;
        let in_cooldown = most_recent.map(|ts| now - ts < cooldown).unwrap_or(false);

        if over_cap || in_cooldown {
            let reason = if over_cap { "daily_cap" } else { "cooldown" };
            outcome.excluded.push(Exclusion { ad_id: ad.id, reason });
        } else {
            outcome.eligible.push(ad);
        }
    }

    outcome
}
