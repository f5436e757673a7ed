//! Hybrid user-recommendation engine for a restaurant social network.
//!
//! Ranks candidate users for a target to follow, from two signals:
//! collaborative filtering over restaurant-visit history and proximity in the
//! follow graph. The two ranked lists are fused under a named strategy
//! (WEIGHTED, SWITCHING or CASCADING) and served through a TTL cache.
//!
//! The engine is a library-level component: it reads everything through the
//! [`DataGateway`] trait, caches through [`RecommendationCache`], and leaves
//! HTTP, persistence technology and request timeouts to the host.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabletalk_recommend::{
//!     FusionStrategy, MemoryCache, MemoryGateway, RecommendConfig, RecommendEngine,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let gateway = Arc::new(MemoryGateway::new());
//! let engine = RecommendEngine::new(
//!     gateway,
//!     Arc::new(MemoryCache::new()),
//!     RecommendConfig::default(),
//! );
//! let ranked = engine
//!     .generate_recommendations(uuid::Uuid::new_v4(), 10, FusionStrategy::Weighted)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collaborative;
pub mod config;
pub mod error;
pub mod fusion;
pub mod gateway;
pub mod persistence;
pub mod profile;
pub mod similarity;
pub mod social;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::{CacheKey, MemoryCache, RecommendationCache, RedisCache};
pub use collaborative::CollaborativeFilteringEngine;
pub use config::{
    CacheConfig, CollaborativeConfig, HybridConfig, RecommendConfig, SocialConfig,
};
pub use error::{RecommendError, Result};
pub use gateway::{DataGateway, MemoryGateway};
pub use persistence::{
    MemoryStore, RecommendationRecord, RecommendationStats, RecommendationStore,
};
pub use profile::InteractionVectorBuilder;
pub use similarity::SimilarityMethod;
pub use social::SocialGraphAnalyzer;
pub use types::{
    AlgorithmType, FollowEdge, FusionStrategy, PreferenceVector, RecommendationScore,
    RestaurantInfo, UserInfo, VisitRecord, VisitType,
};

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_LIMIT: usize = 50;

/// The engine facade. Stateless across requests except for the cache.
pub struct RecommendEngine {
    cache: Arc<dyn RecommendationCache>,
    config: RecommendConfig,
    collaborative: CollaborativeFilteringEngine,
    social: SocialGraphAnalyzer,
}

impl RecommendEngine {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        cache: Arc<dyn RecommendationCache>,
        config: RecommendConfig,
    ) -> Self {
        let collaborative = CollaborativeFilteringEngine::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            config.collaborative.clone(),
            config.cache.clone(),
        );
        let social = SocialGraphAnalyzer::new(
            gateway,
            Arc::clone(&cache),
            config.social.clone(),
            config.cache.clone(),
        );
        Self {
            cache,
            config,
            collaborative,
            social,
        }
    }

    /// Generate hybrid recommendations for `user_id`.
    ///
    /// The sole entry point for fused output: computes (or serves from cache)
    /// the collaborative and social lists, merges them under `strategy` and
    /// caches the merged list for 30 minutes per (user, limit, strategy).
    pub async fn generate_recommendations(
        &self,
        user_id: Uuid,
        limit: usize,
        strategy: FusionStrategy,
    ) -> Result<Vec<RecommendationScore>> {
        validate_limit(limit)?;
        info!(user = %user_id, limit, strategy = strategy.name(), "generating recommendations");

        let namespace = format!("hybrid_recommendations:{}", strategy.name());
        let key = CacheKey::new(namespace, user_id, limit);
        if let Some(cached) = cache::lookup(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let collaborative = self.collaborative.recommend(user_id, limit).await?;
        let social = self.social.recommend(user_id, limit).await?;
        let fused = fusion::fuse(
            strategy,
            collaborative,
            social,
            limit,
            self.config.hybrid.collaborative_weight,
        );

        cache::store(self.cache.as_ref(), key, &fused, self.config.cache.ttl()).await;
        Ok(fused)
    }

    /// As [`generate_recommendations`](Self::generate_recommendations), with
    /// the strategy supplied as a caller string. Unknown names fall back to
    /// WEIGHTED with a logged warning.
    pub async fn generate_recommendations_named(
        &self,
        user_id: Uuid,
        limit: usize,
        strategy: &str,
    ) -> Result<Vec<RecommendationScore>> {
        self.generate_recommendations(user_id, limit, FusionStrategy::parse_lossy(strategy))
            .await
    }

    /// Collaborative-only ranking, without fusion.
    pub async fn collaborative_recommendations(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RecommendationScore>> {
        validate_limit(limit)?;
        self.collaborative.recommend(user_id, limit).await
    }

    /// Social-only ranking, without fusion.
    pub async fn social_recommendations(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RecommendationScore>> {
        validate_limit(limit)?;
        self.social.recommend(user_id, limit).await
    }

    /// Drop every cached list for one user. Hosts call this when the user's
    /// visits or follows change.
    pub async fn invalidate_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.cache.invalidate_user(user_id).await
    }
}

fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(RecommendError::InvalidLimit(limit));
    }
    Ok(())
}
