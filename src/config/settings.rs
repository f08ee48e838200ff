use dotenv::dotenv;
use std::env;

/// Score weights for the composite scorer (spec §4.5). Must sum to 1.0
/// within 10⁻³ — validated once at startup, never at request time.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub priority: f64,
    pub ctr: f64,
    pub recency: f64,
    pub freshness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            priority: 0.35,
            ctr: 0.25,
            recency: 0.20,
            freshness: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.priority + self.ctr + self.recency + self.freshness;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(format!("score weights must sum to 1.0, got {sum}"));
        }
        Ok(())
    }
}

/// Segment thresholds (spec §3). Strictly increasing is enforced at startup.
#[derive(Debug, Clone, Copy)]
pub struct SegmentThresholds {
    pub mass: f64,
    pub affluent: f64,
    pub hnw: f64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            mass: 50_000.0,
            affluent: 200_000.0,
            hnw: 1_000_000.0,
        }
    }
}

impl SegmentThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.mass < self.affluent && self.affluent < self.hnw) {
            return Err("segment thresholds must be strictly increasing".into());
        }
        Ok(())
    }
}

/// Frequency-cap tunables (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct FrequencyCap {
    pub max_per_day: u32,
    pub cooldown_secs: i64,
}

impl Default for FrequencyCap {
    fn default() -> Self {
        Self {
            max_per_day: 3,
            cooldown_secs: 2 * 3600,
        }
    }
}

/// Cache TTL tunables (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub high_availability_secs: u64,
    pub low_availability_secs: u64,
    pub thin_supply_threshold: usize,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            high_availability_secs: 30,
            low_availability_secs: 120,
            thin_supply_threshold: 3,
        }
    }
}

/// CTR substitution tunables (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct CtrConfig {
    pub min_impressions: u64,
    pub default_ctr: f64,
    pub normalisation_cap: f64,
}

impl Default for CtrConfig {
    fn default() -> Self {
        Self {
            min_impressions: 10,
            default_ctr: 0.02,
            normalisation_cap: 0.1,
        }
    }
}

/// One rate-limit layer's window/quota (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitWindow {
    pub window_secs: u64,
    pub max_requests: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_ip: RateLimitWindow,
    pub standard: RateLimitWindow,
    pub premium: RateLimitWindow,
    pub enterprise: RateLimitWindow,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_ip: RateLimitWindow { window_secs: 60, max_requests: 100 },
            standard: RateLimitWindow { window_secs: 60, max_requests: 500 },
            premium: RateLimitWindow { window_secs: 60, max_requests: 1000 },
            enterprise: RateLimitWindow { window_secs: 60, max_requests: 5000 },
        }
    }
}

impl RateLimitConfig {
    pub fn for_tier(&self, tier: &str) -> RateLimitWindow {
        match tier {
            "premium" => self.premium,
            "enterprise" => self.enterprise,
            _ => self.standard,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub score_weights: ScoreWeights,
    pub segment_thresholds: SegmentThresholds,
    pub frequency_cap: FrequencyCap,
    pub cache_ttls: CacheTtls,
    pub ctr: CtrConfig,
    pub rate_limits: RateLimitConfig,
    pub recency_horizon_days: i64,
}

impl Settings {
    /// Loads from the environment (`.env` is read if present) and validates
    /// every startup invariant from §5/§9: reject at construction rather
    /// than let a misconfigured scorer start serving.
    pub fn new() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid u16"))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL missing from env"))?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let settings = Self {
            server_port,
            database_url,
            redis_url,
            score_weights: ScoreWeights::default(),
            segment_thresholds: SegmentThresholds::default(),
            frequency_cap: FrequencyCap::default(),
            cache_ttls: CacheTtls::default(),
            ctr: CtrConfig::default(),
            rate_limits: RateLimitConfig::default(),
            recency_horizon_days: 30,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Ready-to-use config for unit/integration tests, no environment
    /// required (SPEC_FULL §10.3).
    pub fn default_for_tests() -> Self {
        Self {
            server_port: 0,
            database_url: String::new(),
            redis_url: String::new(),
            score_weights: ScoreWeights::default(),
            segment_thresholds: SegmentThresholds::default(),
            frequency_cap: FrequencyCap::default(),
            cache_ttls: CacheTtls::default(),
            ctr: CtrConfig::default(),
            rate_limits: RateLimitConfig::default(),
            recency_horizon_days: 30,
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        self.score_weights
            .validate()
            .map_err(|e| anyhow::anyhow!(e))?;
        self.segment_thresholds
            .validate()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(ScoreWeights::default().validate().is_ok());
    }

    #[test]
    fn unbalanced_weights_rejected() {
        let weights = ScoreWeights { priority: 0.5, ctr: 0.5, recency: 0.5, freshness: 0.5 };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn thresholds_must_increase() {
        let bad = SegmentThresholds { mass: 200_000.0, affluent: 50_000.0, hnw: 1_000_000.0 };
        assert!(bad.validate().is_err());
    }
}
