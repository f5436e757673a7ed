//! Shared value types for the recommendation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-user mapping of restaurant id to derived interest weight.
///
/// Transient: rebuilt for every request, never persisted.
pub type PreferenceVector = HashMap<Uuid, f64>;

/// How a user interacted with a restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Review,
    Recommendation,
    Favorite,
    CheckIn,
    Other,
}

impl VisitType {
    /// Fixed interaction weight used when folding visits into a preference vector.
    pub fn weight(&self) -> f64 {
        match self {
            VisitType::Review => 1.0,
            VisitType::Recommendation => 0.9,
            VisitType::Favorite => 0.8,
            VisitType::CheckIn => 0.6,
            VisitType::Other => 0.5,
        }
    }
}

/// One row of a user's visit history, as supplied by the data gateway.
///
/// Read-only snapshot per request; a missing rating defaults to 3.0 at the
/// point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub rating: Option<f64>,
    pub visit_count: u32,
    pub visit_type: VisitType,
    pub last_visit_time: Option<DateTime<Utc>>,
}

impl VisitRecord {
    pub fn rating_or_default(&self) -> f64 {
        self.rating.unwrap_or(3.0)
    }
}

/// Directed follow relation. Self-loops are not expected but not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: Uuid,
    pub following_id: Uuid,
}

/// Which pipeline produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmType {
    Collaborative,
    Social,
    Hybrid,
}

impl AlgorithmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Collaborative => "collaborative",
            AlgorithmType::Social => "social",
            AlgorithmType::Hybrid => "hybrid",
        }
    }
}

/// Policy for merging collaborative and social ranked lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FusionStrategy {
    Weighted,
    Switching,
    Cascading,
}

impl FusionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FusionStrategy::Weighted => "WEIGHTED",
            FusionStrategy::Switching => "SWITCHING",
            FusionStrategy::Cascading => "CASCADING",
        }
    }

    /// Parse a caller-supplied strategy name, case-insensitively.
    ///
    /// Unknown names fall back to WEIGHTED with a warning rather than failing,
    /// keeping the engine resilient to caller typos.
    pub fn parse_lossy(name: &str) -> FusionStrategy {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "WEIGHTED" => FusionStrategy::Weighted,
            "SWITCHING" => FusionStrategy::Switching,
            "CASCADING" => FusionStrategy::Cascading,
            other => {
                tracing::warn!(strategy = %other, "unknown fusion strategy, falling back to WEIGHTED");
                FusionStrategy::Weighted
            }
        }
    }
}

/// Minimal user profile joined into recommendation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Minimal restaurant profile joined into recommendation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub id: Uuid,
    pub name: String,
    pub cuisine: String,
}

/// One ranked candidate user with its scoring breakdown.
///
/// `score` is always in [0, 1]; lists are sorted non-increasing by `score`
/// with ties kept in first-seen order. Serializes directly into a persisted
/// recommendation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationScore {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub score: f64,
    pub algorithm: AlgorithmType,
    pub similarity: f64,
    pub social_distance: Option<u8>,
    pub mutual_follows_count: Option<usize>,
    pub activity_score: Option<f64>,
    pub influence_score: Option<f64>,
    pub reason: String,
    pub common_restaurants: Vec<RestaurantInfo>,
}

/// Sort a candidate list by score descending.
///
/// `sort_by` is stable, so equal scores keep their original scan order; the
/// ordering is deterministic regardless of how the inputs were fetched.
pub fn sort_ranked(scores: &mut [RecommendationScore]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_type_weights_ordered() {
        assert_eq!(VisitType::Review.weight(), 1.0);
        assert!(VisitType::Review.weight() > VisitType::Recommendation.weight());
        assert!(VisitType::Recommendation.weight() > VisitType::Favorite.weight());
        assert!(VisitType::Favorite.weight() > VisitType::CheckIn.weight());
        assert_eq!(VisitType::Other.weight(), 0.5);
    }

    #[test]
    fn test_parse_lossy_known_names() {
        assert_eq!(FusionStrategy::parse_lossy("weighted"), FusionStrategy::Weighted);
        assert_eq!(FusionStrategy::parse_lossy("SWITCHING"), FusionStrategy::Switching);
        assert_eq!(FusionStrategy::parse_lossy(" cascading "), FusionStrategy::Cascading);
    }

    #[test]
    fn test_parse_lossy_unknown_falls_back() {
        assert_eq!(FusionStrategy::parse_lossy("casacding"), FusionStrategy::Weighted);
        assert_eq!(FusionStrategy::parse_lossy(""), FusionStrategy::Weighted);
    }

    #[test]
    fn test_sort_ranked_stable_ties() {
        let mk = |id: u128, score: f64| RecommendationScore {
            user_id: Uuid::from_u128(id),
            user_name: String::new(),
            user_avatar: None,
            score,
            algorithm: AlgorithmType::Collaborative,
            similarity: 0.0,
            social_distance: None,
            mutual_follows_count: None,
            activity_score: None,
            influence_score: None,
            reason: String::new(),
            common_restaurants: Vec::new(),
        };

        let mut list = vec![mk(1, 0.5), mk(2, 0.9), mk(3, 0.5), mk(4, 0.7)];
        sort_ranked(&mut list);

        let ids: Vec<u128> = list.iter().map(|s| s.user_id.as_u128()).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }
}
