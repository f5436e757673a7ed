//! Read-only data access boundary.
//!
//! The engine never issues queries itself; everything it needs from the host
//! system's persistence layer comes through [`DataGateway`]. Implementations
//! own their retry/backoff policy — the engine performs no retries.

use crate::types::{FollowEdge, RestaurantInfo, UserInfo, VisitRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait DataGateway: Send + Sync {
    /// All visit records for one user, in stable store order.
    async fn visits_by_user(&self, user_id: Uuid) -> Result<Vec<VisitRecord>>;

    /// All visit records touching any of the given restaurants, in stable
    /// store order. This is the collaborative neighborhood query.
    async fn visits_by_restaurants(&self, restaurant_ids: &[Uuid]) -> Result<Vec<VisitRecord>>;

    /// User `a`'s visit records restricted to restaurants also visited by `b`.
    async fn common_visits(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<VisitRecord>>;

    /// Direct out-edges of the follow graph, in stable store order.
    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    async fn follower_count(&self, user_id: Uuid) -> Result<u64>;

    async fn following_count(&self, user_id: Uuid) -> Result<u64>;

    /// Global average rating for a restaurant; `None` when it has no rated visits.
    async fn restaurant_average_rating(&self, restaurant_id: Uuid) -> Result<Option<f64>>;

    async fn unique_visitor_count(&self, restaurant_id: Uuid) -> Result<u64>;

    async fn user(&self, user_id: Uuid) -> Result<Option<UserInfo>>;

    async fn restaurant(&self, restaurant_id: Uuid) -> Result<Option<RestaurantInfo>>;
}

/// In-memory gateway over plain collections.
///
/// Reference implementation for embedders without a database and the fixture
/// used throughout the test suite. Insertion order is preserved so derived
/// queries are deterministic.
#[derive(Default)]
pub struct MemoryGateway {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    visits: Vec<VisitRecord>,
    follows: Vec<FollowEdge>,
    users: HashMap<Uuid, UserInfo>,
    restaurants: HashMap<Uuid, RestaurantInfo>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_visit(&self, visit: VisitRecord) {
        self.inner.write().expect("gateway lock").visits.push(visit);
    }

    pub fn add_follow(&self, follower_id: Uuid, following_id: Uuid) {
        self.inner.write().expect("gateway lock").follows.push(FollowEdge {
            follower_id,
            following_id,
        });
    }

    pub fn add_user(&self, user: UserInfo) {
        self.inner.write().expect("gateway lock").users.insert(user.id, user);
    }

    pub fn add_restaurant(&self, restaurant: RestaurantInfo) {
        self.inner
            .write()
            .expect("gateway lock")
            .restaurants
            .insert(restaurant.id, restaurant);
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn visits_by_user(&self, user_id: Uuid) -> Result<Vec<VisitRecord>> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state
            .visits
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn visits_by_restaurants(&self, restaurant_ids: &[Uuid]) -> Result<Vec<VisitRecord>> {
        let wanted: HashSet<Uuid> = restaurant_ids.iter().copied().collect();
        let state = self.inner.read().expect("gateway lock");
        Ok(state
            .visits
            .iter()
            .filter(|v| wanted.contains(&v.restaurant_id))
            .cloned()
            .collect())
    }

    async fn common_visits(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<VisitRecord>> {
        let state = self.inner.read().expect("gateway lock");
        let b_restaurants: HashSet<Uuid> = state
            .visits
            .iter()
            .filter(|v| v.user_id == user_b)
            .map(|v| v.restaurant_id)
            .collect();
        Ok(state
            .visits
            .iter()
            .filter(|v| v.user_id == user_a && b_restaurants.contains(&v.restaurant_id))
            .cloned()
            .collect())
    }

    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state
            .follows
            .iter()
            .filter(|e| e.follower_id == user_id)
            .map(|e| e.following_id)
            .collect())
    }

    async fn follower_count(&self, user_id: Uuid) -> Result<u64> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state.follows.iter().filter(|e| e.following_id == user_id).count() as u64)
    }

    async fn following_count(&self, user_id: Uuid) -> Result<u64> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state.follows.iter().filter(|e| e.follower_id == user_id).count() as u64)
    }

    async fn restaurant_average_rating(&self, restaurant_id: Uuid) -> Result<Option<f64>> {
        let state = self.inner.read().expect("gateway lock");
        let ratings: Vec<f64> = state
            .visits
            .iter()
            .filter(|v| v.restaurant_id == restaurant_id)
            .filter_map(|v| v.rating)
            .collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        Ok(Some(ratings.iter().sum::<f64>() / ratings.len() as f64))
    }

    async fn unique_visitor_count(&self, restaurant_id: Uuid) -> Result<u64> {
        let state = self.inner.read().expect("gateway lock");
        let visitors: HashSet<Uuid> = state
            .visits
            .iter()
            .filter(|v| v.restaurant_id == restaurant_id)
            .map(|v| v.user_id)
            .collect();
        Ok(visitors.len() as u64)
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<UserInfo>> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state.users.get(&user_id).cloned())
    }

    async fn restaurant(&self, restaurant_id: Uuid) -> Result<Option<RestaurantInfo>> {
        let state = self.inner.read().expect("gateway lock");
        Ok(state.restaurants.get(&restaurant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VisitType;
    use chrono::Utc;

    fn visit(user: Uuid, restaurant: Uuid, rating: f64) -> VisitRecord {
        VisitRecord {
            user_id: user,
            restaurant_id: restaurant,
            rating: Some(rating),
            visit_count: 1,
            visit_type: VisitType::Review,
            last_visit_time: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_common_visits_returns_first_users_records() {
        let gw = MemoryGateway::new();
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let (r1, r2, r3) = (Uuid::from_u128(10), Uuid::from_u128(11), Uuid::from_u128(12));

        gw.add_visit(visit(a, r1, 5.0));
        gw.add_visit(visit(a, r2, 4.0));
        gw.add_visit(visit(b, r2, 3.0));
        gw.add_visit(visit(b, r3, 5.0));

        let common = gw.common_visits(a, b).await.unwrap();
        assert_eq!(common.len(), 1);
        assert_eq!(common[0].user_id, a);
        assert_eq!(common[0].restaurant_id, r2);
    }

    #[tokio::test]
    async fn test_average_rating_and_visitors() {
        let gw = MemoryGateway::new();
        let r = Uuid::from_u128(10);
        gw.add_visit(visit(Uuid::from_u128(1), r, 4.0));
        gw.add_visit(visit(Uuid::from_u128(2), r, 2.0));

        assert_eq!(gw.restaurant_average_rating(r).await.unwrap(), Some(3.0));
        assert_eq!(gw.unique_visitor_count(r).await.unwrap(), 2);
        assert_eq!(
            gw.restaurant_average_rating(Uuid::from_u128(99)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_follow_counts() {
        let gw = MemoryGateway::new();
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        gw.add_follow(a, b);
        gw.add_follow(c, b);
        gw.add_follow(b, a);

        assert_eq!(gw.follower_count(b).await.unwrap(), 2);
        assert_eq!(gw.following_count(b).await.unwrap(), 1);
        assert_eq!(gw.following_ids(a).await.unwrap(), vec![b]);
    }
}
