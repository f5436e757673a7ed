//! Fusion of collaborative and social ranked lists.
//!
//! Pure functions over already-computed lists; no gateway or cache access.
//! Every fused entry is re-tagged as hybrid and its reason rewritten to name
//! the strategy, so callers can tell merged output from raw single-source
//! output.

use crate::types::{sort_ranked, AlgorithmType, FusionStrategy, RecommendationScore};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Merge the two ranked lists under `strategy` and truncate to `limit`.
///
/// `collaborative_weight` is the WEIGHTED blend share `w`; social contributes
/// `1 - w`. Either list may be empty; both empty yields an empty result.
pub fn fuse(
    strategy: FusionStrategy,
    collaborative: Vec<RecommendationScore>,
    social: Vec<RecommendationScore>,
    limit: usize,
    collaborative_weight: f64,
) -> Vec<RecommendationScore> {
    debug!(
        strategy = strategy.name(),
        collaborative = collaborative.len(),
        social = social.len(),
        "fusing ranked lists"
    );

    let mut fused = match strategy {
        FusionStrategy::Weighted => weighted(collaborative, social, collaborative_weight),
        FusionStrategy::Switching => switching(collaborative, social),
        FusionStrategy::Cascading => cascading(collaborative, social),
    };

    fused.truncate(limit);
    for entry in &mut fused {
        entry.algorithm = AlgorithmType::Hybrid;
        entry.reason = format!(
            "hybrid recommendation ({}): {}",
            strategy.name(),
            entry.reason
        );
    }
    fused
}

/// Union candidates by user id. Where both sources rank a candidate, blend
/// the scores; a single-source candidate keeps its own score.
fn weighted(
    collaborative: Vec<RecommendationScore>,
    social: Vec<RecommendationScore>,
    w: f64,
) -> Vec<RecommendationScore> {
    let mut social_by_user: HashMap<uuid::Uuid, RecommendationScore> = HashMap::new();
    let social_order: Vec<uuid::Uuid> = social.iter().map(|s| s.user_id).collect();
    for entry in social {
        social_by_user.insert(entry.user_id, entry);
    }

    let mut fused = Vec::new();
    for mut entry in collaborative {
        if let Some(social_entry) = social_by_user.remove(&entry.user_id) {
            entry.score = entry.score * w + social_entry.score * (1.0 - w);
            // Carry the graph facts the collaborative entry lacks.
            entry.social_distance = social_entry.social_distance;
            entry.mutual_follows_count = social_entry.mutual_follows_count;
            entry.activity_score = social_entry.activity_score;
            entry.influence_score = social_entry.influence_score;
        }
        fused.push(entry);
    }
    // Social-only candidates, in their original rank order.
    for user_id in social_order {
        if let Some(entry) = social_by_user.remove(&user_id) {
            fused.push(entry);
        }
    }

    sort_ranked(&mut fused);
    fused
}

/// Return whichever source carries the higher average score, unmodified. Ties
/// and the both-empty case go to collaborative.
fn switching(
    collaborative: Vec<RecommendationScore>,
    social: Vec<RecommendationScore>,
) -> Vec<RecommendationScore> {
    let mut chosen = if mean_score(&social) > mean_score(&collaborative) {
        debug!("switching fusion chose the social source");
        social
    } else {
        debug!("switching fusion chose the collaborative source");
        collaborative
    };
    let source = chosen
        .first()
        .map(|s| s.algorithm.as_str())
        .unwrap_or("collaborative");
    let note = format!(" [source: {source}]");
    for entry in &mut chosen {
        entry.reason.push_str(&note);
    }
    chosen
}

/// Collaborative results first in their existing order, topped up with social
/// results that are not already present.
fn cascading(
    collaborative: Vec<RecommendationScore>,
    social: Vec<RecommendationScore>,
) -> Vec<RecommendationScore> {
    let mut seen: HashSet<uuid::Uuid> = collaborative.iter().map(|s| s.user_id).collect();
    let mut fused = collaborative;
    for entry in social {
        if seen.insert(entry.user_id) {
            fused.push(entry);
        }
    }
    fused
}

fn mean_score(list: &[RecommendationScore]) -> f64 {
    if list.is_empty() {
        return 0.0;
    }
    list.iter().map(|s| s.score).sum::<f64>() / list.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn score(user: u128, value: f64, algorithm: AlgorithmType) -> RecommendationScore {
        RecommendationScore {
            user_id: Uuid::from_u128(user),
            user_name: format!("user-{user}"),
            user_avatar: None,
            score: value,
            algorithm,
            similarity: 0.0,
            social_distance: None,
            mutual_follows_count: None,
            activity_score: None,
            influence_score: None,
            reason: "tastes like yours".to_string(),
            common_restaurants: Vec::new(),
        }
    }

    fn collaborative(user: u128, value: f64) -> RecommendationScore {
        score(user, value, AlgorithmType::Collaborative)
    }

    fn social(user: u128, value: f64) -> RecommendationScore {
        score(user, value, AlgorithmType::Social)
    }

    #[test]
    fn test_weighted_blends_shared_candidates() {
        let fused = fuse(
            FusionStrategy::Weighted,
            vec![collaborative(1, 0.8)],
            vec![social(1, 0.4)],
            10,
            0.6,
        );
        assert_eq!(fused.len(), 1);
        // 0.8*0.6 + 0.4*0.4
        assert!((fused[0].score - 0.64).abs() < 1e-9);
        assert_eq!(fused[0].algorithm, AlgorithmType::Hybrid);
    }

    #[test]
    fn test_weighted_keeps_single_source_scores() {
        let fused = fuse(
            FusionStrategy::Weighted,
            vec![collaborative(1, 0.5)],
            vec![social(2, 0.9)],
            10,
            0.6,
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].user_id, Uuid::from_u128(2));
        assert!((fused[0].score - 0.9).abs() < 1e-9);
        assert!((fused[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_self_fusion_preserves_order() {
        let list = vec![collaborative(1, 0.9), collaborative(2, 0.7), collaborative(3, 0.5)];
        let fused = fuse(
            FusionStrategy::Weighted,
            list.clone(),
            list.clone(),
            10,
            0.6,
        );
        let order: Vec<_> = fused.iter().map(|s| s.user_id).collect();
        let expected: Vec<_> = list.iter().map(|s| s.user_id).collect();
        assert_eq!(order, expected);
        for (fused_entry, original) in fused.iter().zip(&list) {
            assert!((fused_entry.score - original.score).abs() < 1e-9);
        }
    }

    #[test]
    fn test_switching_picks_higher_average_source() {
        let fused = fuse(
            FusionStrategy::Switching,
            vec![collaborative(1, 0.4), collaborative(2, 0.4)],
            vec![social(3, 0.9)],
            10,
            0.6,
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].user_id, Uuid::from_u128(3));
        assert!(fused[0].reason.contains("source: social"));
    }

    #[test]
    fn test_switching_tie_goes_to_collaborative() {
        let fused = fuse(
            FusionStrategy::Switching,
            vec![collaborative(1, 0.5)],
            vec![social(2, 0.5)],
            10,
            0.6,
        );
        assert_eq!(fused[0].user_id, Uuid::from_u128(1));
        assert!(fused[0].reason.contains("source: collaborative"));
    }

    #[test]
    fn test_cascading_keeps_collaborative_prefix_verbatim() {
        let collab = vec![collaborative(1, 0.3), collaborative(2, 0.2)];
        let fused = fuse(
            FusionStrategy::Cascading,
            collab.clone(),
            vec![social(3, 0.9)],
            2,
            0.6,
        );
        let order: Vec<_> = fused.iter().map(|s| s.user_id).collect();
        assert_eq!(order, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
    }

    #[test]
    fn test_cascading_tops_up_without_duplicates() {
        let fused = fuse(
            FusionStrategy::Cascading,
            vec![collaborative(1, 0.3)],
            vec![social(1, 0.9), social(2, 0.8)],
            10,
            0.6,
        );
        let order: Vec<_> = fused.iter().map(|s| s.user_id).collect();
        assert_eq!(order, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        // The collaborative entry for user 1 wins; the social duplicate is dropped.
        assert!((fused[0].score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs_yield_empty_output() {
        for strategy in [
            FusionStrategy::Weighted,
            FusionStrategy::Switching,
            FusionStrategy::Cascading,
        ] {
            assert!(fuse(strategy, Vec::new(), Vec::new(), 10, 0.6).is_empty());
        }
    }

    #[test]
    fn test_reasons_name_the_strategy() {
        let fused = fuse(
            FusionStrategy::Cascading,
            vec![collaborative(1, 0.3)],
            Vec::new(),
            10,
            0.6,
        );
        assert!(fused[0].reason.starts_with("hybrid recommendation (CASCADING)"));
    }
}
