//! Pairwise similarity between preference vectors.
//!
//! All three metrics are pure functions over sparse restaurant→weight maps.
//! Cosine and Pearson results lie in [-1, 1]; degenerate inputs (no overlap,
//! zero norms, too few common restaurants) return 0.0 rather than erroring.

use crate::types::PreferenceVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimilarityMethod {
    #[default]
    Cosine,
    Pearson,
    AdjustedCosine,
}

/// Dispatch on the configured metric.
///
/// `restaurant_means` is only consulted for adjusted cosine; restaurants
/// missing from it fall back to the neutral 3.0 average.
pub fn similarity(
    method: SimilarityMethod,
    a: &PreferenceVector,
    b: &PreferenceVector,
    restaurant_means: &HashMap<Uuid, f64>,
) -> f64 {
    match method {
        SimilarityMethod::Cosine => cosine(a, b),
        SimilarityMethod::Pearson => pearson(a, b),
        SimilarityMethod::AdjustedCosine => adjusted_cosine(a, b, restaurant_means),
    }
}

fn common_keys<'a>(a: &'a PreferenceVector, b: &PreferenceVector) -> Vec<&'a Uuid> {
    a.keys().filter(|k| b.contains_key(*k)).collect()
}

fn l2_norm(v: &PreferenceVector) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Cosine similarity: dot product over the key intersection divided by the
/// product of the two full-vector L2 norms.
pub fn cosine(a: &PreferenceVector, b: &PreferenceVector) -> f64 {
    let common = common_keys(a, b);
    if common.is_empty() {
        return 0.0;
    }

    let dot: f64 = common.iter().map(|k| a[k] * b[k]).sum();
    let (norm_a, norm_b) = (l2_norm(a), l2_norm(b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Pearson correlation over the key intersection, centering each vector by
/// its own mean over the intersection. Requires at least two common
/// restaurants.
pub fn pearson(a: &PreferenceVector, b: &PreferenceVector) -> f64 {
    let common = common_keys(a, b);
    if common.len() < 2 {
        return 0.0;
    }

    let n = common.len() as f64;
    let mean_a: f64 = common.iter().map(|k| a[k]).sum::<f64>() / n;
    let mean_b: f64 = common.iter().map(|k| b[k]).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for k in &common {
        let da = a[k] - mean_a;
        let db = b[k] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = denom_a.sqrt() * denom_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    numerator / denom
}

/// Adjusted cosine: each weight is centered by that restaurant's global
/// average rating before the dot product. Norms are taken over the adjusted
/// intersection values.
pub fn adjusted_cosine(
    a: &PreferenceVector,
    b: &PreferenceVector,
    restaurant_means: &HashMap<Uuid, f64>,
) -> f64 {
    let common = common_keys(a, b);
    if common.is_empty() {
        return 0.0;
    }

    let mut numerator = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for k in &common {
        let mean = restaurant_means.get(*k).copied().unwrap_or(3.0);
        let da = a[k] - mean;
        let db = b[k] - mean;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = denom_a.sqrt() * denom_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    numerator / denom
}
