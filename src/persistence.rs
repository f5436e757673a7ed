//! Persisted recommendation records and feedback.
//!
//! The engine itself only computes ranked lists; hosts that want to track
//! what was shown and how users reacted write [`RecommendationRecord`]s
//! through a [`RecommendationStore`]. Records are upserted per candidate,
//! keyed by (user, candidate, algorithm), so regenerating a list refreshes
//! scores without duplicating rows.

use crate::types::{AlgorithmType, RecommendationScore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored recommendation with its feedback trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub user_id: Uuid,
    pub candidate_user_id: Uuid,
    pub algorithm: AlgorithmType,
    pub score: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_viewed: bool,
    pub is_interested: Option<bool>,
    pub feedback: Option<String>,
}

impl RecommendationRecord {
    /// Build a fresh record from one engine output entry.
    pub fn from_score(user_id: Uuid, score: &RecommendationScore) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            candidate_user_id: score.user_id,
            algorithm: score.algorithm,
            score: score.score,
            reason: score.reason.clone(),
            created_at: now,
            updated_at: now,
            is_viewed: false,
            is_interested: None,
            feedback: None,
        }
    }
}

/// Aggregate feedback counters for one user's stored recommendations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationStats {
    pub total: usize,
    pub viewed: usize,
    pub interested: usize,
}

impl RecommendationStats {
    /// Share of stored recommendations the user has seen.
    pub fn view_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.viewed as f64 / self.total as f64
        }
    }

    /// Share of viewed recommendations marked interesting.
    pub fn conversion_rate(&self) -> f64 {
        if self.viewed == 0 {
            0.0
        } else {
            self.interested as f64 / self.viewed as f64
        }
    }
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Insert or refresh the records for one generated list. An existing
    /// (user, candidate, algorithm) row keeps its feedback fields and
    /// `created_at`; score, reason and `updated_at` are replaced.
    async fn upsert_batch(
        &self,
        user_id: Uuid,
        scores: &[RecommendationScore],
    ) -> anyhow::Result<()>;

    async fn mark_viewed(
        &self,
        user_id: Uuid,
        candidate_user_id: Uuid,
        algorithm: AlgorithmType,
    ) -> anyhow::Result<()>;

    async fn record_feedback(
        &self,
        user_id: Uuid,
        candidate_user_id: Uuid,
        algorithm: AlgorithmType,
        interested: bool,
        feedback: Option<String>,
    ) -> anyhow::Result<()>;

    /// All stored records for one user, most recently updated first.
    async fn records_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<RecommendationRecord>>;

    async fn stats_for_user(&self, user_id: Uuid) -> anyhow::Result<RecommendationStats>;
}

type RecordKey = (Uuid, Uuid, AlgorithmType);

/// In-process store over a concurrent map. Reference implementation and the
/// test-suite fixture; production hosts put a database behind the trait.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<RecordKey, RecommendationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn upsert_batch(
        &self,
        user_id: Uuid,
        scores: &[RecommendationScore],
    ) -> anyhow::Result<()> {
        for score in scores {
            let key = (user_id, score.user_id, score.algorithm);
            match self.records.get_mut(&key) {
                Some(mut existing) => {
                    existing.score = score.score;
                    existing.reason = score.reason.clone();
                    existing.updated_at = Utc::now();
                }
                None => {
                    self.records
                        .insert(key, RecommendationRecord::from_score(user_id, score));
                }
            }
        }
        Ok(())
    }

    async fn mark_viewed(
        &self,
        user_id: Uuid,
        candidate_user_id: Uuid,
        algorithm: AlgorithmType,
    ) -> anyhow::Result<()> {
        let key = (user_id, candidate_user_id, algorithm);
        if let Some(mut record) = self.records.get_mut(&key) {
            record.is_viewed = true;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_feedback(
        &self,
        user_id: Uuid,
        candidate_user_id: Uuid,
        algorithm: AlgorithmType,
        interested: bool,
        feedback: Option<String>,
    ) -> anyhow::Result<()> {
        let key = (user_id, candidate_user_id, algorithm);
        if let Some(mut record) = self.records.get_mut(&key) {
            record.is_interested = Some(interested);
            record.feedback = feedback;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn records_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<RecommendationRecord>> {
        let mut records: Vec<RecommendationRecord> = self
            .records
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn stats_for_user(&self, user_id: Uuid) -> anyhow::Result<RecommendationStats> {
        let mut stats = RecommendationStats::default();
        for entry in self.records.iter().filter(|e| e.user_id == user_id) {
            stats.total += 1;
            if entry.is_viewed {
                stats.viewed += 1;
            }
            if entry.is_interested == Some(true) {
                stats.interested += 1;
            }
        }
        Ok(stats)
    }
}
