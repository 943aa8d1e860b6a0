//! Keyed vectors and scored matches.

use crate::distance::DistanceMetric;
use crate::{Result, VectorError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Element type a vector field persists its coordinates as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorType {
    Float32,
    #[default]
    Float64,
}

impl VectorType {
    /// Encoded width of one coordinate in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Float32 => 0,
            Self::Float64 => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Float32),
            1 => Some(Self::Float64),
            _ => None,
        }
    }
}

/// A vector tagged with the key of the record it belongs to.
///
/// Construction checks the dimension against the field, so two items built
/// for the same field can always be compared.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorItem {
    pub key: String,
    pub vector: Vec<f64>,
}

impl VectorItem {
    /// Create a vector item for a field of dimension `dim`.
    ///
    /// # Errors
    ///
    /// - [`VectorError::DimensionMismatch`] if `vector.len() != dim`
    /// - [`VectorError::InvalidVector`] if a coordinate is NaN or infinite
    pub fn new(key: impl Into<String>, vector: Vec<f64>, dim: usize) -> Result<Self> {
        if vector.len() != dim {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            });
        }

        for (i, &v) in vector.iter().enumerate() {
            if v.is_nan() {
                return Err(VectorError::InvalidVector(format!("NaN at index {}", i)));
            }
            if v.is_infinite() {
                return Err(VectorError::InvalidVector(format!("Inf at index {}", i)));
            }
        }

        Ok(Self {
            key: key.into(),
            vector,
        })
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// Distance between two items under `metric`.
///
/// # Errors
///
/// Returns [`VectorError::DimensionMismatch`] if the items have different
/// lengths.
pub fn compute_similarity(a: &VectorItem, b: &VectorItem, metric: DistanceMetric) -> Result<f64> {
    if a.dim() != b.dim() {
        return Err(VectorError::DimensionMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    Ok(metric.distance(&a.vector, &b.vector))
}

/// A key returned from vector search with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub key: String,
    /// Lower = more similar
    pub distance: f64,
}

impl VectorMatch {
    pub fn new(key: impl Into<String>, distance: f64) -> Self {
        Self {
            key: key.into(),
            distance,
        }
    }
}

impl Eq for VectorMatch {}

impl PartialOrd for VectorMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VectorMatch {
    /// Distance first, key second, so equal distances order reproducibly.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.key.cmp(&other.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_checks_dimension() {
        assert!(VectorItem::new("1", vec![1.0, 1.2, 1.4], 3).is_ok());

        let err = VectorItem::new("1", vec![1.0, 1.2], 3).unwrap_err();
        assert!(matches!(
            err,
            VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_create_rejects_non_finite() {
        assert!(matches!(
            VectorItem::new("x", vec![1.0, f64::NAN], 2),
            Err(VectorError::InvalidVector(_))
        ));
        assert!(matches!(
            VectorItem::new("x", vec![f64::INFINITY, 1.0], 2),
            Err(VectorError::InvalidVector(_))
        ));
    }

    #[test]
    fn test_compute_similarity() {
        let v1 = VectorItem::new("1", vec![1.0, 1.2, 1.4], 3).unwrap();
        let v2 = VectorItem::new("2", vec![3.0, 3.2, 3.4], 3).unwrap();
        let v3 = VectorItem::new("3", vec![1.0, 1.2, 1.4], 3).unwrap();

        assert_eq!(compute_similarity(&v1, &v3, DistanceMetric::L2).unwrap(), 0.0);
        let d = compute_similarity(&v1, &v2, DistanceMetric::L2).unwrap();
        assert!((d - 12f64.sqrt()).abs() < 1e-5);

        let short = VectorItem::new("s", vec![1.0], 1).unwrap();
        assert!(compute_similarity(&v1, &short, DistanceMetric::L2).is_err());
    }

    #[test]
    fn test_vector_match_ordering() {
        let mut matches = vec![
            VectorMatch::new("b", 1.0),
            VectorMatch::new("c", 2.0),
            VectorMatch::new("a", 1.0),
            VectorMatch::new("d", 0.5),
        ];
        matches.sort();

        let keys: Vec<_> = matches.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_vector_type_sizes() {
        assert_eq!(VectorType::Float32.element_size(), 4);
        assert_eq!(VectorType::Float64.element_size(), 8);
        assert_eq!(VectorType::from_u8(VectorType::Float32.as_u8()), Some(VectorType::Float32));
        assert_eq!(VectorType::from_u8(7), None);
    }
}
