//! Composite weighted scorer (spec §4.5): `score = w_p*priority_norm +
//! w_c*ctr_norm + w_r*recency + w_f*freshness`. Every component but CTR is
//! normalised *within the candidate set*, so the scorer is a pure function
//! of the whole set, not of one ad in isolation.

use chrono::{DateTime, Utc};

use crate::config::settings::{CtrConfig, ScoreWeights};
use crate::domain::ad::Ad;

#[derive(Debug, Clone, Copy)]
pub struct ScoredAd<'a> {
    pub ad: &'a Ad,
    pub score: f64,
}

/// Click-through rate with a Laplace-style floor for low-volume ads (spec
/// §4.5): ads under `min_impressions` fall back to `default_ctr` rather than
/// let a single early click produce a misleadingly large ratio.
fn raw_ctr(ad: &Ad, cfg: &CtrConfig) -> f64 {
    if ad.impressions < cfg.min_impressions {
        cfg.default_ctr
    } else {
        ad.clicks as f64 / ad.impressions as f64
    }
}

fn ctr_score(ad: &Ad, cfg: &CtrConfig) -> f64 {
    if cfg.normalisation_cap <= 0.0 {
        return 0.0;
    }
    (raw_ctr(ad, cfg) / cfg.normalisation_cap).min(1.0)
}

/// `max(a.priority, b.priority ∨ 1)` over the candidate set, floored at 1 so
/// an all-zero-priority set still normalises to a defined score.
fn max_priority(candidates: &[Ad]) -> f64 {
    candidates
        .iter()
        .map(|ad| if ad.priority > 0.0 { ad.priority } else { 1.0 })
        .fold(0.0_f64, f64::max)
}

fn priority_score(ad: &Ad, max_priority: f64) -> f64 {
    let p = if ad.priority > 0.0 { ad.priority } else { 1.0 };
    if max_priority <= 0.0 {
        1.0
    } else {
        (p / max_priority).clamp(0.0, 1.0)
    }
}

/// Recency score: 1.0 for an ad whose campaign just started, decaying
/// linearly to 0 at `horizon_days` since `startDate`. Never negative.
fn recency_score(ad: &Ad, now: DateTime<Utc>, horizon_days: i64) -> f64 {
    if horizon_days <= 0 {
        return 0.0;
    }
    let age_days = (now - ad.start_date).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days / horizon_days as f64).max(0.0)
}

/// `max(b.impressions ∨ 0)` over the candidate set, floored at 1 so the
/// freshness ratio below is always well defined.
fn max_impressions(candidates: &[Ad]) -> u64 {
    candidates.iter().map(|a| a.impressions).max().unwrap_or(0).max(1)
}

/// Freshness score: inverse of how heavily an ad has already been shown,
/// relative to the most-shown ad in the candidate set. A never-shown ad
/// scores 1.0; the most-shown ad in the set scores lowest.
fn freshness_score(ad: &Ad, max_impressions: u64) -> f64 {
    1.0 - (ad.impressions as f64 / max_impressions as f64)
}

/// Scores and ranks candidates highest-first. Ties break by higher
/// `priority`, then earlier `startDate`, then lexicographic `adId` (spec
/// §4.5) — deterministic across replicas, never an arbitrary sort order.
pub fn score_and_rank<'a>(
    candidates: &'a [Ad],
    weights: &ScoreWeights,
    ctr_cfg: &CtrConfig,
    now: DateTime<Utc>,
    recency_horizon_days: i64,
) -> Vec<ScoredAd<'a>> {
    let max_priority = max_priority(candidates);
    let max_impr = max_impressions(candidates);

    let mut scored: Vec<ScoredAd<'a>> = candidates
        .iter()
        .map(|ad| {
            let priority_norm = priority_score(ad, max_priority);
            let ctr_norm = ctr_score(ad, ctr_cfg);
            let recency = recency_score(ad, now, recency_horizon_days);
            let freshness = freshness_score(ad, max_impr);

            let score = weights.priority * priority_norm
                + weights.ctr * ctr_norm
                + weights.recency * recency
                + weights.freshness * freshness;

            ScoredAd { ad, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.ad.priority.partial_cmp(&a.ad.priority).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.ad.start_date.cmp(&b.ad.start_date))
            .then_with(|| a.ad.id.cmp(&b.ad.id))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ad::{AdStatus, Channel, Segment};
    use chrono::Duration;

    fn base_ad(id: &str, now: DateTime<Utc>) -> Ad {
        Ad {
            id: id.into(),
            title: "t".into(),
            image_url: "i".into(),
            video_url: None,
            cta: None,
            segments: vec![Segment::Mass],
            channels: vec![Channel::Atm],
            locations: None,
            time_slots: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(10),
            status: AdStatus::Active,
            priority: 1.0,
            impressions: 0,
            clicks: 0,
            advertiser: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn higher_priority_ranks_first_when_other_signals_equal() {
        let now = Utc::now();
        let mut low = base_ad("low", now);
        low.priority = 1.0;
        let mut high = base_ad("high", now);
        high.priority = 5.0;

        let ads = vec![low, high];
        let weights = ScoreWeights::default();
        let ctr = CtrConfig::default();
        let ranked = score_and_rank(&ads, &weights, &ctr, now, 30);

        assert_eq!(ranked[0].ad.id, "high");
    }

    #[test]
    fn low_impression_ads_use_default_ctr_not_zero() {
        let now = Utc::now();
        let ad = base_ad("new", now);
        let ctr = CtrConfig::default();
        assert_eq!(raw_ctr(&ad, &ctr), ctr.default_ctr);
    }

    #[test]
    fn heavily_shown_ad_scores_lower_freshness_than_never_shown_one() {
        let now = Utc::now();
        let mut heavy = base_ad("heavy", now);
        heavy.impressions = 500;
        let fresh = base_ad("fresh", now);
        let ads = vec![heavy.clone(), fresh.clone()];
        let max_impr = max_impressions(&ads);

        let f1 = freshness_score(&heavy, max_impr);
        let f2 = freshness_score(&fresh, max_impr);
        assert!(f1 < f2);
        assert_eq!(f2, 1.0);
    }

    #[test]
    fn older_campaign_scores_lower_recency_than_one_that_just_started() {
        let now = Utc::now();
        let mut old = base_ad("old", now);
        old.start_date = now - Duration::days(20);
        let fresh_start = base_ad("fresh-start", now);

        let r1 = recency_score(&old, now, 30);
        let r2 = recency_score(&fresh_start, now, 30);
        assert!(r1 < r2);
        assert_eq!(r2, 1.0);
    }

    #[test]
    fn priority_is_normalised_against_the_candidate_sets_max() {
        let now = Utc::now();
        let mut low = base_ad("low", now);
        low.priority = 1.0;
        let mut high = base_ad("high", now);
        high.priority = 4.0;
        let ads = vec![low, high];
        let max_p = max_priority(&ads);

        assert_eq!(max_p, 4.0);
        assert_eq!(priority_score(&ads[0], max_p), 0.25);
        assert_eq!(priority_score(&ads[1], max_p), 1.0);
    }

    #[test]
    fn scores_are_deterministic_and_ties_break_by_priority_then_start_date_then_id() {
        let now = Utc::now();
        let ads = vec![base_ad("b", now), base_ad("a", now)];
        let weights = ScoreWeights::default();
        let ctr = CtrConfig::default();
        let ranked = score_and_rank(&ads, &weights, &ctr, now, 30);
        assert_eq!(ranked[0].ad.id, "a");
        assert_eq!(ranked[1].ad.id, "b");
    }
}
