//! HNSW configuration and the persisted field metadata record.

use crate::keys::{get_sized_string, put_sized, SearchKey};
use crate::{HnswError, Result};
use bytes::{Buf, BufMut, BytesMut};
use nori_kv::{KvRead, WriteBatch};
use nori_vector::{DistanceMetric, VectorType};
use serde::{Deserialize, Serialize};

const FIELD_META_VERSION: u8 = 1;

/// HNSW construction and runtime parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Base branching factor (M parameter); also sets the level decay.
    /// Default: 16
    pub m: u16,

    /// Max neighbours per node on layers > 0.
    /// Default: M
    pub max_m: u16,

    /// Max neighbours per node on layer 0.
    /// Default: 2*M
    pub max_m0: u16,

    /// Beam width while inserting.
    /// Higher = better graph quality, slower inserts.
    /// Default: 200
    pub ef_construction: u32,

    /// Beam width while searching (widened to k when smaller).
    /// Default: 10
    pub ef_runtime: u32,

    /// Relative slack on range query radii.
    /// Default: 0.01
    pub epsilon: f64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::with_m(16)
    }
}

impl HnswConfig {
    /// Default parameters with the neighbour caps derived from `m`.
    pub fn with_m(m: u16) -> Self {
        Self {
            m,
            max_m: m,
            max_m0: m.saturating_mul(2),
            ef_construction: 200,
            ef_runtime: 10,
            epsilon: 0.01,
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(HnswError::InvalidArgument(format!(
                "m must be at least 2, got {}",
                self.m
            )));
        }
        if self.max_m == 0 || self.max_m0 == 0 {
            return Err(HnswError::InvalidArgument(
                "neighbour caps must be positive".to_string(),
            ));
        }
        if self.ef_construction == 0 || self.ef_runtime == 0 {
            return Err(HnswError::InvalidArgument("ef must be positive".to_string()));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(HnswError::InvalidArgument(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Metadata of one HNSW vector field.
///
/// Shared by every search and rewritten (in the caller's batch) by every
/// insert or delete that changes `num_levels` or `entry_point`.
#[derive(Debug, Clone, PartialEq)]
pub struct HnswVectorFieldMetadata {
    pub vector_type: VectorType,
    pub dim: u16,
    pub distance_metric: DistanceMetric,
    pub m: u16,
    pub max_m: u16,
    pub max_m0: u16,
    pub ef_construction: u32,
    pub ef_runtime: u32,
    pub epsilon: f64,
    /// Number of layers; layers are 0..num_levels
    pub num_levels: u16,
    /// Start node of every search, present on layer num_levels - 1
    pub entry_point: Option<String>,
}

impl HnswVectorFieldMetadata {
    /// Metadata for a new, empty field.
    pub fn new(
        dim: u16,
        distance_metric: DistanceMetric,
        vector_type: VectorType,
        config: &HnswConfig,
    ) -> Self {
        Self {
            vector_type,
            dim,
            distance_metric,
            m: config.m,
            max_m: config.max_m,
            max_m0: config.max_m0,
            ef_construction: config.ef_construction,
            ef_runtime: config.ef_runtime,
            epsilon: config.epsilon,
            num_levels: 0,
            entry_point: None,
        }
    }

    /// Construction/runtime parameters of this field.
    pub fn config(&self) -> HnswConfig {
        HnswConfig {
            m: self.m,
            max_m: self.max_m,
            max_m0: self.max_m0,
            ef_construction: self.ef_construction,
            ef_runtime: self.ef_runtime,
            epsilon: self.epsilon,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(HnswError::InvalidArgument("dimension must be positive".to_string()));
        }
        self.config().validate()
    }

    /// Neighbour cap on `level`.
    pub fn capacity(&self, level: u16) -> usize {
        if level == 0 {
            self.max_m0 as usize
        } else {
            self.max_m as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_levels == 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(48);
        buf.put_u8(FIELD_META_VERSION);
        buf.put_u8(self.vector_type.as_u8());
        buf.put_u16(self.dim);
        buf.put_u8(self.distance_metric.as_u8());
        buf.put_u16(self.m);
        buf.put_u16(self.max_m);
        buf.put_u16(self.max_m0);
        buf.put_u32(self.ef_construction);
        buf.put_u32(self.ef_runtime);
        buf.put_f64(self.epsilon);
        buf.put_u16(self.num_levels);
        match &self.entry_point {
            Some(key) => {
                buf.put_u8(1);
                put_sized(&mut buf, key.as_bytes());
            }
            None => buf.put_u8(0),
        }
        buf.to_vec()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        // Fixed part: everything up to and including the entry point flag
        const FIXED_LEN: usize = 1 + 1 + 2 + 1 + 2 + 2 + 2 + 4 + 4 + 8 + 2 + 1;
        if buf.remaining() < FIXED_LEN {
            return Err(HnswError::Corruption("truncated field metadata".to_string()));
        }

        let version = buf.get_u8();
        if version != FIELD_META_VERSION {
            return Err(HnswError::Corruption(format!(
                "unsupported field metadata version: {}",
                version
            )));
        }

        let vector_type_tag = buf.get_u8();
        let vector_type = VectorType::from_u8(vector_type_tag).ok_or_else(|| {
            HnswError::Corruption(format!("unknown vector type: {}", vector_type_tag))
        })?;
        let dim = buf.get_u16();
        let metric_tag = buf.get_u8();
        let distance_metric = DistanceMetric::from_u8(metric_tag).ok_or_else(|| {
            HnswError::Corruption(format!("unknown distance metric: {}", metric_tag))
        })?;
        let m = buf.get_u16();
        let max_m = buf.get_u16();
        let max_m0 = buf.get_u16();
        let ef_construction = buf.get_u32();
        let ef_runtime = buf.get_u32();
        let epsilon = buf.get_f64();
        let num_levels = buf.get_u16();
        let entry_point = match buf.get_u8() {
            0 => None,
            1 => Some(get_sized_string(&mut buf)?),
            flag => {
                return Err(HnswError::Corruption(format!(
                    "invalid entry point flag: {}",
                    flag
                )))
            }
        };

        Ok(Self {
            vector_type,
            dim,
            distance_metric,
            m,
            max_m,
            max_m0,
            ef_construction,
            ef_runtime,
            epsilon,
            num_levels,
            entry_point,
        })
    }

    /// Read the metadata record of `search_key`.
    ///
    /// Returns [`HnswError::NotFound`] if the field has never been defined.
    pub fn load<R: KvRead>(search_key: &SearchKey, db: &R) -> Result<Self> {
        match db.get(&search_key.field_meta())? {
            Some(bytes) => Self::decode(&bytes),
            None => Err(HnswError::NotFound(format!(
                "vector field {}/{}/{}",
                search_key.ns, search_key.index, search_key.field
            ))),
        }
    }

    /// Stage the metadata record into `batch`.
    pub fn put(&self, search_key: &SearchKey, batch: &mut WriteBatch) {
        batch.put(search_key.field_meta(), self.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nori_kv::{KvEngine, MemKv};

    fn sample() -> HnswVectorFieldMetadata {
        let mut meta = HnswVectorFieldMetadata::new(
            128,
            DistanceMetric::Cosine,
            VectorType::Float32,
            &HnswConfig::with_m(8),
        );
        meta.num_levels = 3;
        meta.entry_point = Some("doc:42".to_string());
        meta
    }

    #[test]
    fn test_config_defaults() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.max_m, 16);
        assert_eq!(config.max_m0, 32);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_runtime, 10);
        assert!((config.epsilon - 0.01).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = HnswConfig::with_m(0);
        assert!(matches!(config.validate(), Err(HnswError::InvalidArgument(_))));

        config = HnswConfig::with_m(1);
        assert!(config.validate().is_err());

        config = HnswConfig::default();
        config.ef_runtime = 0;
        assert!(config.validate().is_err());

        config = HnswConfig::default();
        config.epsilon = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: HnswConfig = serde_json::from_str(r#"{"m": 4, "ef_runtime": 50}"#).unwrap();
        assert_eq!(config.m, 4);
        assert_eq!(config.ef_runtime, 50);
        // Missing fields fall back to the defaults for M=16
        assert_eq!(config.max_m0, 32);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = sample();
        let decoded = HnswVectorFieldMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(decoded, meta);

        let mut empty = sample();
        empty.num_levels = 0;
        empty.entry_point = None;
        assert_eq!(HnswVectorFieldMetadata::decode(&empty.encode()).unwrap(), empty);
    }

    #[test]
    fn test_decode_rejects_corrupt() {
        let bytes = sample().encode();
        assert!(matches!(
            HnswVectorFieldMetadata::decode(&bytes[..10]),
            Err(HnswError::Corruption(_))
        ));

        let mut bad_version = bytes.clone();
        bad_version[0] = 99;
        assert!(HnswVectorFieldMetadata::decode(&bad_version).is_err());

        let mut bad_metric = bytes;
        bad_metric[4] = 7;
        assert!(HnswVectorFieldMetadata::decode(&bad_metric).is_err());
    }

    #[test]
    fn test_capacity_per_level() {
        let meta = sample();
        assert_eq!(meta.capacity(0), 16);
        assert_eq!(meta.capacity(1), 8);
        assert_eq!(meta.capacity(5), 8);
    }

    #[test]
    fn test_load_and_put() {
        let kv = MemKv::new();
        let sk = SearchKey::new("ns", "idx", "vec");
        assert!(HnswVectorFieldMetadata::load(&sk, &kv).unwrap_err().is_not_found());

        let mut batch = WriteBatch::new();
        sample().put(&sk, &mut batch);
        kv.write(batch).unwrap();

        assert_eq!(HnswVectorFieldMetadata::load(&sk, &kv).unwrap(), sample());
    }
}
