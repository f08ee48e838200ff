//! Minimal API-key tier lookup (SPEC_FULL §11). Authentication itself is an
//! external collaborator (spec §1 Non-goals); this only resolves a tier name
//! for the rate limiter to consult, defaulting to `standard` when the key is
//! absent or unknown.

use crate::ports::kv::KvPort;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_TIER: &str = "standard";

fn tier_key(api_key: &str) -> String {
    let suffix: String = api_key.chars().rev().take(8).collect::<String>().chars().rev().collect();
    format!("apikey:tier:{suffix}")
}

/// Looks up the tier for an API key via `apikey:tier:{last-8-chars}`,
/// degrading to `standard` on miss or KV error — never denies a request
/// because the tier lookup itself failed.
pub async fn resolve_tier(kv: &dyn KvPort, api_key: Option<&str>) -> String {
    let Some(key) = api_key else {
        return DEFAULT_TIER.to_string();
    };
    if !kv.is_available() {
        return DEFAULT_TIER.to_string();
    }
    match kv.get(&tier_key(key)).await {
        Ok(Some(tier)) => tier,
        Ok(None) => DEFAULT_TIER.to_string(),
        Err(e) => {
            log::warn!("api key tier lookup failed, defaulting to standard: {e}");
            DEFAULT_TIER.to_string()
        }
    }
}

/// The last 8 characters of the key, used both for the tier lookup and the
/// rate-limit bucket key (spec §4.7) so a leaked log line never exposes a
/// whole key.
pub fn bucket_suffix(api_key: &str) -> String {
    api_key.chars().rev().take(8).collect::<String>().chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryKv;

    #[tokio::test]
    async fn missing_key_defaults_to_standard() {
        let kv = InMemoryKv::new();
        assert_eq!(resolve_tier(&kv, None).await, "standard");
    }

    #[tokio::test]
    async fn unknown_key_defaults_to_standard() {
        let kv = InMemoryKv::new();
        assert_eq!(resolve_tier(&kv, Some("abcd1234efgh5678")).await, "standard");
    }

    #[tokio::test]
    async fn known_key_resolves_its_configured_tier() {
        let kv = InMemoryKv::new();
        let key = "abcd1234efgh5678";
        kv.set_with_ttl(&tier_key(key), "premium", 0).await.unwrap();
        assert_eq!(resolve_tier(&kv, Some(key)).await, "premium");
    }

    #[test]
    fn bucket_suffix_keeps_only_the_last_eight_chars() {
        assert_eq!(bucket_suffix("abcd1234efgh5678"), "efgh5678");
    }
}
