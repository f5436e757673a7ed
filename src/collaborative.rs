//! Collaborative filtering over the user×restaurant interaction matrix.
//!
//! Ranks candidate users by preference-vector similarity blended with
//! common-restaurant quality, recency, social activity and a diversity term.

use crate::cache::{self, CacheKey, RecommendationCache};
use crate::config::{CacheConfig, CollaborativeConfig};
use crate::error::{RecommendError, Result};
use crate::gateway::DataGateway;
use crate::profile::InteractionVectorBuilder;
use crate::similarity::{self, SimilarityMethod};
use crate::types::{
    sort_ranked, AlgorithmType, RecommendationScore, RestaurantInfo, VisitRecord,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const CACHE_NAMESPACE: &str = "collaborative_recommendations";

pub struct CollaborativeFilteringEngine {
    gateway: Arc<dyn DataGateway>,
    cache: Arc<dyn RecommendationCache>,
    builder: InteractionVectorBuilder,
    config: CollaborativeConfig,
    cache_config: CacheConfig,
}

impl CollaborativeFilteringEngine {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        cache: Arc<dyn RecommendationCache>,
        config: CollaborativeConfig,
        cache_config: CacheConfig,
    ) -> Self {
        let builder = InteractionVectorBuilder::new(Arc::clone(&gateway));
        Self {
            gateway,
            cache,
            builder,
            config,
            cache_config,
        }
    }

    /// Rank candidate users for `target` by collaborative similarity.
    ///
    /// Insufficient data (no visits, no neighbors above the similarity
    /// threshold) returns an empty list, not an error.
    pub async fn recommend(&self, target: Uuid, limit: usize) -> Result<Vec<RecommendationScore>> {
        info!(user = %target, limit, "generating collaborative recommendations");

        let key = CacheKey::new(CACHE_NAMESPACE, target, limit);
        if let Some(cached) = cache::lookup(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let target_vector = self.builder.build_for_user(target).await?;
        if target_vector.is_empty() {
            warn!(user = %target, "no visit history, cannot collaborate-filter");
            return Ok(Vec::new());
        }

        // Neighborhood: everyone who visited any restaurant the target visited,
        // grouped into per-user rows in first-seen scan order.
        let restaurant_ids: Vec<Uuid> = target_vector.keys().copied().collect();
        let neighborhood_visits = self
            .gateway
            .visits_by_restaurants(&restaurant_ids)
            .await
            .map_err(RecommendError::Gateway)?;
        let rows = group_by_user(&neighborhood_visits);

        let restaurant_means = self.restaurant_means(&restaurant_ids).await?;

        let mut candidates: Vec<(Uuid, f64)> = Vec::new();
        for (user_id, visits) in &rows {
            if *user_id == target {
                continue;
            }
            let vector = self.builder.build_from_visits(visits).await?;
            let sim = similarity::similarity(
                self.config.similarity_method,
                &target_vector,
                &vector,
                &restaurant_means,
            );
            if sim >= self.config.similarity_threshold {
                candidates.push((*user_id, sim));
            }
        }

        if candidates.is_empty() {
            warn!(user = %target, "no neighbors above similarity threshold");
            return Ok(Vec::new());
        }

        let following = self
            .gateway
            .following_ids(target)
            .await
            .map_err(RecommendError::Gateway)?;
        let mut excluded: HashSet<Uuid> = following.iter().copied().collect();
        excluded.insert(target);

        let mut scores = Vec::new();
        for (candidate_id, sim) in candidates {
            if excluded.contains(&candidate_id) {
                continue;
            }
            scores.push(self.score_candidate(target, candidate_id, sim, &following).await?);
        }

        sort_ranked(&mut scores);
        scores.truncate(limit);

        info!(user = %target, count = scores.len(), "collaborative recommendations ready");
        cache::store(self.cache.as_ref(), key, &scores, self.cache_config.ttl()).await;
        Ok(scores)
    }

    async fn score_candidate(
        &self,
        target: Uuid,
        candidate: Uuid,
        sim: f64,
        target_following: &[Uuid],
    ) -> Result<RecommendationScore> {
        let common = self
            .gateway
            .common_visits(candidate, target)
            .await
            .map_err(RecommendError::Gateway)?;

        let restaurant_weight = self.restaurant_weight(&common).await?;
        let time_weight = recency_weight(&common, Utc::now());
        let social_weight = self.social_weight(candidate).await?;
        let diversity_weight = self.diversity_weight(candidate, target_following).await?;

        let score = (sim * 0.4
            + restaurant_weight * 0.25
            + time_weight * 0.15
            + social_weight * 0.15
            + diversity_weight * 0.05)
            .clamp(0.0, 1.0);

        let common_restaurants = self.common_restaurant_infos(&common).await?;
        let user = self
            .gateway
            .user(candidate)
            .await
            .map_err(RecommendError::Gateway)?;
        let user_name = user
            .as_ref()
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let reason = build_reason(&user_name, &common_restaurants);

        Ok(RecommendationScore {
            user_id: candidate,
            user_name,
            user_avatar: user.and_then(|u| u.avatar_url),
            score,
            algorithm: AlgorithmType::Collaborative,
            similarity: sim,
            social_distance: None,
            mutual_follows_count: None,
            activity_score: None,
            influence_score: None,
            reason,
            common_restaurants,
        })
    }

    /// Average quality of the visits the candidate shares with the target:
    /// rating, visit frequency, restaurant popularity and interaction type.
    async fn restaurant_weight(&self, common: &[VisitRecord]) -> Result<f64> {
        if common.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        let mut unique: HashSet<Uuid> = HashSet::new();
        for visit in common {
            unique.insert(visit.restaurant_id);

            let rating_weight = visit.rating_or_default() / 5.0;
            let count_weight = (f64::from(visit.visit_count.max(1)) / 5.0).min(1.0);
            let popularity = self.builder.restaurant_popularity(visit.restaurant_id).await?;
            let type_weight = visit.visit_type.weight();

            total += rating_weight * 0.4 + count_weight * 0.3 + popularity * 0.2 + type_weight * 0.1;
        }

        Ok((total / unique.len() as f64).min(1.0))
    }

    /// Log-scaled reach of the candidate: follow-graph degree plus breadth of
    /// restaurant history.
    async fn social_weight(&self, user_id: Uuid) -> Result<f64> {
        let followers = self
            .gateway
            .follower_count(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let following = self
            .gateway
            .following_count(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let visited = self.visited_restaurant_count(user_id).await?;

        let social = ((followers + following) as f64).ln_1p() / 10.0;
        let breadth = (visited as f64).ln_1p() / 10.0;
        Ok((social + breadth).min(1.0))
    }

    /// Rewards candidates unlike the target's existing follows, measured by
    /// activity-level distance. A target following nobody gets the maximum.
    async fn diversity_weight(&self, candidate: Uuid, target_following: &[Uuid]) -> Result<f64> {
        if target_following.is_empty() {
            return Ok(1.0);
        }

        let candidate_activity = self.activity_level(candidate).await?;
        let mut total = 0.0;
        for followed in target_following {
            let followed_activity = self.activity_level(*followed).await?;
            let diff = (candidate_activity as f64 - followed_activity as f64).abs() / 100.0;
            total += diff.clamp(0.0, 1.0);
        }

        Ok((total / target_following.len() as f64).clamp(0.0, 1.0))
    }

    /// Raw activity level: distinct restaurants visited plus follow-graph degree.
    async fn activity_level(&self, user_id: Uuid) -> Result<u64> {
        let visited = self.visited_restaurant_count(user_id).await?;
        let following = self
            .gateway
            .following_count(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let followers = self
            .gateway
            .follower_count(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        Ok(visited + following + followers)
    }

    async fn visited_restaurant_count(&self, user_id: Uuid) -> Result<u64> {
        let visits = self
            .gateway
            .visits_by_user(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let unique: HashSet<Uuid> = visits.iter().map(|v| v.restaurant_id).collect();
        Ok(unique.len() as u64)
    }

    async fn restaurant_means(&self, restaurant_ids: &[Uuid]) -> Result<HashMap<Uuid, f64>> {
        if self.config.similarity_method != SimilarityMethod::AdjustedCosine {
            return Ok(HashMap::new());
        }
        let mut means = HashMap::with_capacity(restaurant_ids.len());
        for id in restaurant_ids {
            let mean = self
                .gateway
                .restaurant_average_rating(*id)
                .await
                .map_err(RecommendError::Gateway)?
                .unwrap_or(3.0);
            means.insert(*id, mean);
        }
        Ok(means)
    }

    async fn common_restaurant_infos(&self, common: &[VisitRecord]) -> Result<Vec<RestaurantInfo>> {
        let mut seen = HashSet::new();
        let mut infos = Vec::new();
        for visit in common {
            if !seen.insert(visit.restaurant_id) {
                continue;
            }
            if let Some(info) = self
                .gateway
                .restaurant(visit.restaurant_id)
                .await
                .map_err(RecommendError::Gateway)?
            {
                infos.push(info);
            }
        }
        Ok(infos)
    }
}

/// Group a neighborhood's visit records into per-user rows, preserving the
/// first-seen order of users so downstream tie-breaks stay deterministic.
fn group_by_user(visits: &[VisitRecord]) -> Vec<(Uuid, Vec<VisitRecord>)> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut rows: Vec<(Uuid, Vec<VisitRecord>)> = Vec::new();
    for visit in visits {
        match index.get(&visit.user_id) {
            Some(&i) => rows[i].1.push(visit.clone()),
            None => {
                index.insert(visit.user_id, rows.len());
                rows.push((visit.user_id, vec![visit.clone()]));
            }
        }
    }
    rows
}

/// Average recency bucket of the common visits. Distinct from the preference
/// time-decay buckets: ≤30 days → 1.0, ≤90 → 0.6, older → 0.3. Visits without
/// a timestamp are skipped.
fn recency_weight(visits: &[VisitRecord], now: DateTime<Utc>) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;
    for visit in visits {
        let Some(at) = visit.last_visit_time else {
            continue;
        };
        let days = (now - at).num_days();
        total += if days <= 30 {
            1.0
        } else if days <= 90 {
            0.6
        } else {
            0.3
        };
        counted += 1;
    }
    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

/// Natural-language reason built from the most frequent shared cuisine and up
/// to three named restaurants.
fn build_reason(user_name: &str, common: &[RestaurantInfo]) -> String {
    if common.is_empty() {
        return format!("{user_name} has restaurant tastes similar to yours");
    }

    let mut cuisine_counts: HashMap<&str, usize> = HashMap::new();
    for info in common {
        *cuisine_counts.entry(info.cuisine.as_str()).or_insert(0) += 1;
    }
    let top_cuisine = cuisine_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(cuisine, _)| *cuisine)
        .unwrap_or("restaurants");

    let names: Vec<&str> = common.iter().take(3).map(|r| r.name.as_str()).collect();
    let subject = if cuisine_counts.len() == 1 {
        format!("{top_cuisine} restaurants")
    } else {
        "similar kinds of restaurants".to_string()
    };

    format!(
        "You and {user_name} both enjoy {subject}, like {}",
        names.join(", ")
    )
}
