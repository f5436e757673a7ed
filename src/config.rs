//! Engine configuration.
//!
//! Every tunable the scoring pipeline uses lives here with the defaults the
//! system shipped with. The whole tree deserializes with serde, so deployments
//! can override any field from a `recommend.toml` file or `RECOMMEND_`-prefixed
//! environment variables via [`RecommendConfig::load`].

use crate::similarity::SimilarityMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub collaborative: CollaborativeConfig,
    pub social: SocialConfig,
    pub hybrid: HybridConfig,
    pub cache: CacheConfig,
}

/// Collaborative-filtering tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    /// Neighbors below this similarity are discarded before scoring.
    pub similarity_threshold: f64,
    pub similarity_method: SimilarityMethod,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            similarity_method: SimilarityMethod::Cosine,
        }
    }
}

/// Social-graph tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Score weight for candidates at social distance 1.
    pub first_degree_weight: f64,
    /// Score weight for candidates at social distance 2.
    pub second_degree_weight: f64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            first_degree_weight: 1.0,
            second_degree_weight: 0.5,
        }
    }
}

/// Fusion tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HybridConfig {
    /// WEIGHTED blend: collaborative share `w`; social gets `1 - w`.
    pub collaborative_weight: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            collaborative_weight: 0.6,
        }
    }
}

/// Result-cache tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds. Entries are idempotently recomputable,
    /// so TTL is the only eviction policy required.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

impl RecommendConfig {
    /// Load configuration from an optional `recommend.toml` in the working
    /// directory layered with `RECOMMEND_`-prefixed environment variables
    /// (`RECOMMEND_HYBRID__COLLABORATIVE_WEIGHT=0.7`). Missing sources fall
    /// back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("recommend").required(false))
            .add_source(config::Environment::with_prefix("RECOMMEND").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_tunables() {
        let cfg = RecommendConfig::default();
        assert_eq!(cfg.collaborative.similarity_threshold, 0.3);
        assert_eq!(cfg.collaborative.similarity_method, SimilarityMethod::Cosine);
        assert_eq!(cfg.hybrid.collaborative_weight, 0.6);
        assert_eq!(cfg.cache.ttl_secs, 1800);
        assert_eq!(cfg.social.first_degree_weight, 1.0);
        assert_eq!(cfg.social.second_degree_weight, 0.5);
    }

    #[test]
    fn test_roundtrips_through_serde() {
        let cfg = RecommendConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RecommendConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cache.ttl_secs, cfg.cache.ttl_secs);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let cfg: RecommendConfig =
            serde_json::from_str(r#"{"hybrid":{"collaborative_weight":0.7}}"#).unwrap();
        assert_eq!(cfg.hybrid.collaborative_weight, 0.7);
        assert_eq!(cfg.collaborative.similarity_threshold, 0.3);
    }
}
