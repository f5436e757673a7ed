//! Preference-vector construction from visit history.
//!
//! Each visit contributes a composite weight built from its rating, the
//! interaction type and a capped visit-count boost; per-restaurant sums are
//! then normalized and blended with restaurant popularity and a time-decay
//! term. An empty visit history yields an empty vector — callers must treat
//! that as "cannot collaborate-filter this user", not as an error.

use crate::error::{RecommendError, Result};
use crate::gateway::DataGateway;
use crate::types::{PreferenceVector, VisitRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct InteractionVectorBuilder {
    gateway: Arc<dyn DataGateway>,
}

impl InteractionVectorBuilder {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Build the preference vector for one user from their full visit history.
    pub async fn build_for_user(&self, user_id: Uuid) -> Result<PreferenceVector> {
        let visits = self
            .gateway
            .visits_by_user(user_id)
            .await
            .map_err(RecommendError::Gateway)?;
        self.build_from_visits(&visits).await
    }

    /// Build a preference vector from an already-fetched slice of one user's
    /// visits. Used by the collaborative engine, which fetches a whole
    /// neighborhood in one gateway call and folds it row by row.
    pub async fn build_from_visits(&self, visits: &[VisitRecord]) -> Result<PreferenceVector> {
        if visits.is_empty() {
            return Ok(PreferenceVector::new());
        }

        // Per restaurant: summed composite weight, summed visit count, and the
        // most recent visit time across records.
        let mut sums: HashMap<Uuid, f64> = HashMap::new();
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        let mut latest: HashMap<Uuid, Option<DateTime<Utc>>> = HashMap::new();

        for visit in visits {
            *sums.entry(visit.restaurant_id).or_insert(0.0) += composite_weight(visit);
            *counts.entry(visit.restaurant_id).or_insert(0) += visit.visit_count.max(1);
            let slot = latest.entry(visit.restaurant_id).or_insert(None);
            if visit.last_visit_time > *slot {
                *slot = visit.last_visit_time;
            }
        }

        let now = Utc::now();
        let mut vector = PreferenceVector::with_capacity(sums.len());
        for (restaurant_id, sum) in sums {
            let count = counts[&restaurant_id].max(1) as f64;
            let popularity = self.restaurant_popularity(restaurant_id).await?;
            let decay = time_decay(latest[&restaurant_id], now);
            let weight = (sum / count) * 0.6 + popularity * 0.2 + decay * 0.2;
            vector.insert(restaurant_id, weight);
        }

        debug!(restaurants = vector.len(), "built preference vector");
        Ok(vector)
    }

    /// Restaurant popularity: unique-visitor volume (100 visitors saturates)
    /// blended with the global average rating.
    pub async fn restaurant_popularity(&self, restaurant_id: Uuid) -> Result<f64> {
        let visitors = self
            .gateway
            .unique_visitor_count(restaurant_id)
            .await
            .map_err(RecommendError::Gateway)?;
        let avg_rating = self
            .gateway
            .restaurant_average_rating(restaurant_id)
            .await
            .map_err(RecommendError::Gateway)?
            .unwrap_or(3.0);

        let visitor_score = (visitors as f64 / 100.0).min(1.0);
        let rating_score = avg_rating / 5.0;
        Ok(visitor_score * 0.6 + rating_score * 0.4)
    }
}

/// Composite weight of a single visit:
/// `rating * type_weight * (1 + min(visit_count / 5, 1) * 0.2)`.
pub fn composite_weight(visit: &VisitRecord) -> f64 {
    let count_weight = (f64::from(visit.visit_count.max(1)) / 5.0).min(1.0);
    visit.rating_or_default() * visit.visit_type.weight() * (1.0 + count_weight * 0.2)
}

/// Bucketed recency factor for preference weighting. Visits without a
/// timestamp get the neutral 0.5.
pub fn time_decay(last_visit: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(at) = last_visit else {
        return 0.5;
    };
    let days = (now - at).num_days();
    if days <= 7 {
        1.0
    } else if days <= 30 {
        0.8
    } else if days <= 90 {
        0.6
    } else {
        0.4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::types::VisitType;
    use chrono::Duration;

    fn visit(
        user: Uuid,
        restaurant: Uuid,
        rating: f64,
        count: u32,
        visit_type: VisitType,
        days_ago: i64,
    ) -> VisitRecord {
        VisitRecord {
            user_id: user,
            restaurant_id: restaurant,
            rating: Some(rating),
            visit_count: count,
            visit_type,
            last_visit_time: Some(Utc::now() - Duration::days(days_ago)),
        }
    }

    #[test]
    fn test_composite_weight_formula() {
        let v = visit(Uuid::from_u128(1), Uuid::from_u128(10), 5.0, 2, VisitType::Review, 3);
        // 5.0 * 1.0 * (1 + (2/5) * 0.2)
        assert!((composite_weight(&v) - 5.4).abs() < 1e-9);
    }

    #[test]
    fn test_composite_weight_caps_visit_count() {
        let v = visit(Uuid::from_u128(1), Uuid::from_u128(10), 5.0, 50, VisitType::Review, 3);
        assert!((composite_weight(&v) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rating_defaults() {
        let mut v = visit(Uuid::from_u128(1), Uuid::from_u128(10), 0.0, 1, VisitType::CheckIn, 3);
        v.rating = None;
        // 3.0 * 0.6 * (1 + 0.2 * 0.2)
        assert!((composite_weight(&v) - 1.872).abs() < 1e-9);
    }

    #[test]
    fn test_time_decay_buckets() {
        let now = Utc::now();
        assert_eq!(time_decay(Some(now - Duration::days(3)), now), 1.0);
        assert_eq!(time_decay(Some(now - Duration::days(20)), now), 0.8);
        assert_eq!(time_decay(Some(now - Duration::days(60)), now), 0.6);
        assert_eq!(time_decay(Some(now - Duration::days(200)), now), 0.4);
        assert_eq!(time_decay(None, now), 0.5);
    }

    #[tokio::test]
    async fn test_empty_history_yields_empty_vector() {
        let gateway = Arc::new(MemoryGateway::new());
        let builder = InteractionVectorBuilder::new(gateway);
        let vector = builder.build_for_user(Uuid::from_u128(1)).await.unwrap();
        assert!(vector.is_empty());
    }

    #[tokio::test]
    async fn test_vector_accumulates_repeat_visits() {
        let gateway = Arc::new(MemoryGateway::new());
        let user = Uuid::from_u128(1);
        let r = Uuid::from_u128(10);
        gateway.add_visit(visit(user, r, 5.0, 1, VisitType::Review, 2));
        gateway.add_visit(visit(user, r, 4.0, 1, VisitType::CheckIn, 2));

        let builder = InteractionVectorBuilder::new(gateway);
        let vector = builder.build_for_user(user).await.unwrap();
        assert_eq!(vector.len(), 1);

        // Normalized sum, blended with popularity and fresh-visit decay.
        let sum = 5.0 * 1.0 * 1.04 + 4.0 * 0.6 * 1.04;
        let popularity = (1.0 / 100.0) * 0.6 + (4.5 / 5.0) * 0.4;
        let expected = (sum / 2.0) * 0.6 + popularity * 0.2 + 1.0 * 0.2;
        assert!((vector[&r] - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_popularity_defaults_for_unknown_restaurant() {
        let gateway = Arc::new(MemoryGateway::new());
        let builder = InteractionVectorBuilder::new(gateway);
        let p = builder.restaurant_popularity(Uuid::from_u128(99)).await.unwrap();
        // No visitors, neutral 3.0 rating.
        assert!((p - 0.24).abs() < 1e-9);
    }
}
