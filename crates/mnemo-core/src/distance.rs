//! Distance metrics for vector similarity calculations.

use serde::{Deserialize, Serialize};

/// Distance metric for vector similarity calculations.
///
/// All metrics are expressed as distances: lower values mean more similar.
/// The metric is fixed when an index is opened and must be identical at
/// insert and query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance, `1 - cos(θ)`, range `[0, 2]`.
    /// Best for normalized vectors, commonly used with text embeddings.
    #[default]
    Cosine,

    /// Euclidean distance (L2 norm).
    /// Best for spatial data and when magnitude matters.
    Euclidean,

    /// Negated dot product.
    /// Best for maximum inner product search (MIPS).
    DotProduct,
}

impl DistanceMetric {
    /// Calculates the distance between two vectors using this metric.
    ///
    /// # Panics
    ///
    /// Panics if vectors have different dimensions. The engine validates
    /// dimensions at the API boundary before any distance is computed.
    #[must_use]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            Self::Cosine => Self::cosine_distance(a, b),
            Self::Euclidean => Self::euclidean_distance(a, b),
            Self::DotProduct => -Self::dot_product(a, b),
        }
    }

    /// Calculates cosine distance between two vectors.
    ///
    /// A zero-norm vector has no direction; its distance to anything is 1.0
    /// (orthogonal) rather than NaN.
    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }

        1.0 - dot / (norm_a * norm_b)
    }

    /// Calculates Euclidean distance between two vectors.
    fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Calculates dot product between two vectors.
    fn dot_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}
