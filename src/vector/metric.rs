//! Distances between fingerprints. Smaller always means more similar.
use crate::utils::types::{DistanceMetric, Score};

impl DistanceMetric {
    pub fn between(self, a: &[f32], b: &[f32]) -> Score {
        distance(a, b, self)
    }
}

/// Distance between two fingerprints under `metric`.
///
/// Panics when the lengths differ; engines check query length up front.
pub fn distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> Score {
    assert_eq!(a.len(), b.len(), "Vectors must be the same length");

    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::Dot => -dot(a, b),
        DistanceMetric::Euclidean => euclidean_distance(a, b),
    }
}

/// `1 - cos(a, b)`. An all-zero fingerprint has no direction and sits at
/// distance 1 from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> Score {
    let norms = dot(a, a).sqrt() * dot(b, b).sqrt();
    if norms == 0.0 {
        return 1.0;
    }
    1.0 - (dot(a, b) / norms).clamp(-1.0, 1.0)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Score {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}
