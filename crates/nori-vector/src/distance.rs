//! Distance metrics for vector similarity.
//!
//! Provides the three metrics a vector field can be configured with:
//! - **L2**: Euclidean distance
//! - **Inner product**: negated dot product, for maximum inner product search
//! - **Cosine**: one minus cosine similarity, for direction-only comparisons
//!
//! Every metric is expressed as a distance: lower always means closer, so the
//! graph code never needs to know which metric is in use.
//!
//! The loops are written in chunks of four so release builds auto-vectorize
//! them.

use serde::{Deserialize, Serialize};

/// Distance metric of a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2))
    #[default]
    L2,
    /// Inner product, negated: -(a · b)
    #[serde(rename = "ip")]
    InnerProduct,
    /// Cosine distance: 1 - (a · b) / (||a|| * ||b||)
    Cosine,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    ///
    /// Returns a value where lower = more similar.
    #[inline]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::L2 => euclidean_distance(a, b),
            Self::InnerProduct => -inner_product(a, b),
            Self::Cosine => cosine_distance(a, b),
        }
    }

    /// Stable one-byte tag used by on-disk encodings.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::L2 => 0,
            Self::InnerProduct => 1,
            Self::Cosine => 2,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8).
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::L2),
            1 => Some(Self::InnerProduct),
            2 => Some(Self::Cosine),
            _ => None,
        }
    }
}

/// Compute Euclidean (L2) distance between two vectors.
///
/// # Example
///
/// ```
/// use nori_vector::euclidean_distance;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [4.0, 5.0, 6.0];
/// let dist = euclidean_distance(&a, &b);
/// assert!((dist - 27f64.sqrt()).abs() < 1e-9);
/// ```
#[inline]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Compute squared Euclidean distance (no sqrt, same ordering).
#[inline]
pub fn euclidean_distance_squared(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = 0.0f64;
    let chunks = a.len() / 4;

    for i in 0..chunks {
        let base = i * 4;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    for i in (chunks * 4)..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }

    sum
}

/// Compute cosine distance between two vectors.
///
/// Returns a value in [0, 2]:
/// - 0 = identical direction
/// - 1 = orthogonal (also returned when exactly one vector is all zeros)
/// - 2 = opposite direction
///
/// # Example
///
/// ```
/// use nori_vector::cosine_distance;
///
/// assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-9);
/// assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
/// ```
#[inline]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    // Identical vectors, the all-zero pair included; sqrt(n * n) can land
    // one ulp away from n
    if a == b {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = dot_and_norms(a, b);

    let denom = (norm_a * norm_b).sqrt();
    if denom < f64::EPSILON {
        return 1.0;
    }

    let similarity = (dot / denom).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// Compute the inner (dot) product of two vectors.
///
/// Higher means more similar; [`DistanceMetric::InnerProduct`] negates it.
///
/// ```
/// use nori_vector::inner_product;
///
/// assert!((inner_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]) - 32.0).abs() < 1e-9);
/// ```
#[inline]
pub fn inner_product(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = 0.0f64;
    let chunks = a.len() / 4;

    for i in 0..chunks {
        let base = i * 4;
        sum += a[base] * b[base]
            + a[base + 1] * b[base + 1]
            + a[base + 2] * b[base + 2]
            + a[base + 3] * b[base + 3];
    }

    for i in (chunks * 4)..a.len() {
        sum += a[i] * b[i];
    }

    sum
}

/// Dot product and squared norms in one pass: (dot, |a|^2, |b|^2).
#[inline]
fn dot_and_norms(a: &[f64], b: &[f64]) -> (f64, f64, f64) {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    let chunks = a.len() / 4;

    for i in 0..chunks {
        let base = i * 4;

        dot += a[base] * b[base]
            + a[base + 1] * b[base + 1]
            + a[base + 2] * b[base + 2]
            + a[base + 3] * b[base + 3];

        norm_a += a[base] * a[base]
            + a[base + 1] * a[base + 1]
            + a[base + 2] * a[base + 2]
            + a[base + 3] * a[base + 3];

        norm_b += b[base] * b[base]
            + b[base + 1] * b[base + 1]
            + b[base + 2] * b[base + 2]
            + b[base + 3] * b[base + 3];
    }

    for i in (chunks * 4)..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    (dot, norm_a, norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: [f64; 3] = [1.0, 1.2, 1.4];
    const V2: [f64; 3] = [3.0, 3.2, 3.4];

    #[test]
    fn test_l2() {
        assert_eq!(DistanceMetric::L2.distance(&V1, &V1), 0.0);
        assert!((DistanceMetric::L2.distance(&V1, &V2) - 12f64.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_inner_product_metric() {
        let expected = -(1.0 * 3.0 + 1.2 * 3.2 + 1.4 * 3.4);
        assert!((DistanceMetric::InnerProduct.distance(&V1, &V2) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_metric() {
        let dot = 1.0 * 3.0 + 1.2 * 3.2 + 1.4 * 3.4;
        let norms: f64 = (1.0 * 1.0 + 1.2 * 1.2 + 1.4 * 1.4) * (3.0 * 3.0 + 3.2 * 3.2 + 3.4 * 3.4);
        let expected = 1.0 - dot / norms.sqrt();
        assert!((DistanceMetric::Cosine.distance(&V1, &V2) - expected).abs() < 1e-5);
        assert_eq!(DistanceMetric::Cosine.distance(&V2, &V2), 0.0);
    }

    #[test]
    fn test_cosine_opposite_and_orthogonal() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_cosine() {
        assert!((cosine_distance(&[0.0; 3], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0; 3], &[0.0; 3]), 0.0);
    }

    #[test]
    fn test_high_dimensional() {
        let a: Vec<f64> = (0..128).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..128).map(|i| (i + 1) as f64).collect();
        assert!((euclidean_distance(&a, &b) - 128f64.sqrt()).abs() < 1e-9);
        assert!((euclidean_distance_squared(&a, &b) - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_metric_tags() {
        for metric in [DistanceMetric::L2, DistanceMetric::InnerProduct, DistanceMetric::Cosine] {
            assert_eq!(DistanceMetric::from_u8(metric.as_u8()), Some(metric));
        }
        assert_eq!(DistanceMetric::from_u8(9), None);
    }
}
