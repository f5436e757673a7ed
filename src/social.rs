//! Social-graph recommendations.
//!
//! Walks the follow graph to one and two hops from the target, then scores
//! candidates on preference similarity, social distance, activity, influence
//! and the quality of restaurants shared with the target. Second-degree
//! candidates additionally earn a mutual-follow bonus from the first-degree
//! users bridging to them.

use crate::cache::{self, CacheKey, RecommendationCache};
use crate::config::{CacheConfig, SocialConfig};
use crate::error::{RecommendError, Result};
use crate::gateway::DataGateway;
use crate::profile::InteractionVectorBuilder;
use crate::similarity;
use crate::types::{
    sort_ranked, AlgorithmType, PreferenceVector, RecommendationScore, RestaurantInfo, VisitRecord,
    VisitType,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const CACHE_NAMESPACE: &str = "social_recommendations";

pub struct SocialGraphAnalyzer {
    gateway: Arc<dyn DataGateway>,
    cache: Arc<dyn RecommendationCache>,
    builder: InteractionVectorBuilder,
    config: SocialConfig,
    cache_config: CacheConfig,
}

/// One candidate discovered in the graph walk.
struct GraphCandidate {
    user_id: Uuid,
    distance: u8,
    /// First-degree users of the target who follow this candidate. Empty for
    /// first-degree candidates.
    bridges: Vec<Uuid>,
}

/// Aggregated counters behind the activity and influence formulas.
struct UserStats {
    visited_restaurants: u64,
    total_visits: u64,
    recommendation_visits: u64,
    followers: u64,
    following: u64,
}

impl UserStats {
    /// `min(visited/50,1)*0.4 + min(totalVisits/200,1)*0.3 + min(degree/100,1)*0.3`
    fn activity(&self) -> f64 {
        let visited = (self.visited_restaurants as f64 / 50.0).min(1.0);
        let visits = (self.total_visits as f64 / 200.0).min(1.0);
        let degree = ((self.followers + self.following) as f64 / 100.0).min(1.0);
        visited * 0.4 + visits * 0.3 + degree * 0.3
    }

    /// `min(followers/1000,1)*0.5 + min(totalVisits/100,1)*0.3 + min(recVisits/50,1)*0.2`
    fn influence(&self) -> f64 {
        let followers = (self.followers as f64 / 1000.0).min(1.0);
        let visits = (self.total_visits as f64 / 100.0).min(1.0);
        let recs = (self.recommendation_visits as f64 / 50.0).min(1.0);
        followers * 0.5 + visits * 0.3 + recs * 0.2
    }
}

impl SocialGraphAnalyzer {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        cache: Arc<dyn RecommendationCache>,
        config: SocialConfig,
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

    /// Rank candidate users for `target` by social proximity.
    ///
    /// A target following nobody has no graph to walk and gets an empty list.
    pub async fn recommend(&self, target: Uuid, limit: usize) -> Result<Vec<RecommendationScore>> {
        info!(user = %target, limit, "generating social recommendations");

        let key = CacheKey::new(CACHE_NAMESPACE, target, limit);
        if let Some(cached) = cache::lookup(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let following = self
            .gateway
            .following_ids(target)
            .await
            .map_err(RecommendError::Gateway)?;
        if following.is_empty() {
            warn!(user = %target, "empty follow graph, no social candidates");
            return Ok(Vec::new());
        }

        let candidates = self.walk_graph(target, &following).await?;

        // An empty visit history only disables the similarity term here;
        // distance, activity and influence still rank the graph.
        let target_vector = self.builder.build_for_user(target).await?;

        let excluded: HashSet<Uuid> = following.iter().copied().chain([target]).collect();
        let mut scores = Vec::new();
        for candidate in &candidates {
            if excluded.contains(&candidate.user_id) {
                continue;
            }
            scores.push(self.score_candidate(target, candidate, &target_vector).await?);
        }

        sort_ranked(&mut scores);
        scores.truncate(limit);

        info!(user = %target, count = scores.len(), "social recommendations ready");
        cache::store(self.cache.as_ref(), key, &scores, self.cache_config.ttl()).await;
        Ok(scores)
    }

    /// First- and second-degree candidates in deterministic first-seen order,
    /// with the bridging first-degree users recorded per second-degree
    /// candidate.
    async fn walk_graph(&self, target: Uuid, following: &[Uuid]) -> Result<Vec<GraphCandidate>> {
        let first_degree: HashSet<Uuid> = following.iter().copied().collect();

        let mut candidates: Vec<GraphCandidate> = following
            .iter()
            .map(|&user_id| GraphCandidate {
                user_id,
                distance: 1,
                bridges: Vec::new(),
            })
            .collect();

        let mut second_index: HashMap<Uuid, usize> = HashMap::new();
        for &bridge in following {
            let hops = self
                .gateway
                .following_ids(bridge)
                .await
                .map_err(RecommendError::Gateway)?;
            for hop in hops {
                if hop == target || first_degree.contains(&hop) {
                    continue;
                }
                match second_index.get(&hop) {
                    Some(&i) => candidates[i].bridges.push(bridge),
                    None => {
                        second_index.insert(hop, candidates.len());
                        candidates.push(GraphCandidate {
                            user_id: hop,
                            distance: 2,
                            bridges: vec![bridge],
                        });
                    }
                }
            }
        }

        Ok(candidates)
    }

    async fn score_candidate(
        &self,
        target: Uuid,
        candidate: &GraphCandidate,
        target_vector: &PreferenceVector,
    ) -> Result<RecommendationScore> {
        let candidate_vector = self.builder.build_for_user(candidate.user_id).await?;
        let sim = similarity::cosine(target_vector, &candidate_vector);

        let stats = self.user_stats(candidate.user_id).await?;
        let activity = stats.activity();
        let influence = stats.influence();

        let common = self
            .gateway
            .common_visits(candidate.user_id, target)
            .await
            .map_err(RecommendError::Gateway)?;
        let common_quality = self.common_restaurant_quality(&common).await?;

        let social_weight = if candidate.distance == 1 {
            self.config.first_degree_weight
        } else {
            self.config.second_degree_weight
        };

        let mut score = if candidate.distance == 1 {
            sim * 0.35
                + social_weight * 0.25
                + activity * 0.20
                + influence * 0.15
                + common_quality * 0.05
        } else {
            sim * 0.25
                + social_weight * 0.20
                + activity * 0.20
                + influence * 0.15
                + common_quality * 0.05
        };
        if candidate.distance >= 2 {
            score += self.mutual_follow_bonus(&candidate.bridges).await?;
        }
        let score = score.clamp(0.0, 1.0);

        let common_restaurants = self.common_restaurant_infos(&common).await?;
        let user = self
            .gateway
            .user(candidate.user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let user_name = user
            .as_ref()
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let reason = self
            .build_reason(&user_name, candidate)
            .await?;

        Ok(RecommendationScore {
            user_id: candidate.user_id,
            user_name,
            user_avatar: user.and_then(|u| u.avatar_url),
            score,
            algorithm: AlgorithmType::Social,
            similarity: sim,
            social_distance: Some(candidate.distance),
            mutual_follows_count: Some(candidate.bridges.len()),
            activity_score: Some(activity),
            influence_score: Some(influence),
            reason,
            common_restaurants,
        })
    }

    /// `min(bridgeCount/10, 0.3) + min(avgBridgeInfluence*0.2, 0.2)`
    async fn mutual_follow_bonus(&self, bridges: &[Uuid]) -> Result<f64> {
        if bridges.is_empty() {
            return Ok(0.0);
        }

        let mut total_influence = 0.0;
        for &bridge in bridges {
            total_influence += self.user_stats(bridge).await?.influence();
        }
        let avg_influence = total_influence / bridges.len() as f64;

        let count_bonus = (bridges.len() as f64 / 10.0).min(0.3);
        let influence_bonus = (avg_influence * 0.2).min(0.2);
        Ok(count_bonus + influence_bonus)
    }

    /// Average quality of the visits the candidate shares with the target:
    /// rating, restaurant popularity and interaction type.
    async fn common_restaurant_quality(&self, common: &[VisitRecord]) -> Result<f64> {
        if common.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for visit in common {
            let rating_weight = visit.rating_or_default() / 5.0;
            let popularity = self.builder.restaurant_popularity(visit.restaurant_id).await?;
            let type_weight = visit.visit_type.weight();
            total += rating_weight * 0.5 + popularity * 0.3 + type_weight * 0.2;
        }
        Ok(total / common.len() as f64)
    }

    async fn user_stats(&self, user_id: Uuid) -> Result<UserStats> {
        let visits = self
            .gateway
            .visits_by_user(user_id)
            .await
            .map_err(RecommendError::Gateway)?;

        let visited: HashSet<Uuid> = visits.iter().map(|v| v.restaurant_id).collect();
        let total_visits: u64 = visits.iter().map(|v| u64::from(v.visit_count.max(1))).sum();
        let recommendation_visits: u64 = visits
            .iter()
            .filter(|v| v.visit_type == VisitType::Recommendation)
            .map(|v| u64::from(v.visit_count.max(1)))
            .sum();

        Ok(UserStats {
            visited_restaurants: visited.len() as u64,
            total_visits,
            recommendation_visits,
            followers: self
                .gateway
                .follower_count(user_id)
                .await
                .map_err(RecommendError::Gateway)?,
            following: self
                .gateway
                .following_count(user_id)
                .await
                .map_err(RecommendError::Gateway)?,
        })
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

    async fn build_reason(&self, user_name: &str, candidate: &GraphCandidate) -> Result<String> {
        if candidate.distance == 1 {
            return Ok(format!("{user_name} is in your network"));
        }

        let first_bridge = match candidate.bridges.first() {
            Some(&bridge) => self
                .gateway
                .user(bridge)
                .await
                .map_err(RecommendError::Gateway)?
                .map(|u| u.display_name)
                .unwrap_or_else(|| "unknown".to_string()),
            None => "unknown".to_string(),
        };

        Ok(if candidate.bridges.len() > 1 {
            format!(
                "{user_name} is followed by {} people you follow, including {first_bridge}",
                candidate.bridges.len()
            )
        } else {
            format!("{user_name} is followed by {first_bridge}, who you follow")
        })
    }
}
