//! Frozen configuration record for the fingerprinting pipeline.
//!
//! A single [`FingerprintConfig`] is validated once, by the
//! [`crate::factory::FingerprinterFactory`], and handed down to every
//! component as an immutable slice of itself. No component re-validates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// STFT parameters for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionParams {
    pub n_fft: usize,
    pub hop_length: usize,
}

/// LSH index hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of independent hash tables (`T`).
    pub tables: usize,
    /// Bits per hash key (`H`), must be `<= 64`.
    pub hash_bits: u32,
    /// Candidate-set cap before the comparator refines.
    pub cap: usize,
    /// Seed for the per-table random projection matrices, persisted so
    /// hashes reproduce across restarts.
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            tables: 5,
            hash_bits: 12,
            cap: 500, // 100 * tables
            seed: 0x5A4D_4150_4843_4845,
        }
    }
}

/// Batch driver parallelism knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of workers; `0` means "use all available cores".
    pub worker_count: usize,
    /// In-flight queue depth is `queue_depth_factor * worker_count`.
    pub queue_depth_factor: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            queue_depth_factor: 4,
        }
    }
}

/// Comparator fusion and ranking thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    pub correlation_weight: f32,
    pub l2_weight: f32,
    pub correlation_threshold: f32,
    pub l2_threshold: f32,
    pub min_score: f32,
    pub min_duration: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            correlation_weight: 0.5,
            l2_weight: 0.5,
            correlation_threshold: 0.70,
            l2_threshold: 0.70,
            min_score: 0.70,
            min_duration: 5.0,
        }
    }
}

/// Which resolution of a [`crate::multires::MultiResSignature`] the LSH
/// index stores, when `use_multi_resolution` is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexedResolution {
    Coarse,
    Medium,
    Fine,
}

impl Default for IndexedResolution {
    fn default() -> Self {
        IndexedResolution::Medium
    }
}

/// The complete, frozen configuration record for the core.
///
/// Every recognised option in spec §6's configuration table has a field
/// here. Construct with [`FingerprintConfig::default`] and override
/// fields, or deserialize from the embedder's own config store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub target_sample_rate: u32,
    pub segment_seconds: f32,
    pub pad_tail: bool,

    pub n_fft: usize,
    pub hop_length: usize,

    pub target_peak_count: usize,
    pub peak_sigma_k: f32,

    pub use_multi_resolution: bool,
    pub indexed_resolution: IndexedResolution,

    pub comparator: ComparatorConfig,
    pub lsh: LshConfig,
    pub batch: BatchConfig,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 22050,
            segment_seconds: 10.0,
            pad_tail: false,
            n_fft: 2048,
            hop_length: 512,
            target_peak_count: 100,
            peak_sigma_k: 1.0,
            use_multi_resolution: false,
            indexed_resolution: IndexedResolution::default(),
            comparator: ComparatorConfig::default(),
            lsh: LshConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl FingerprintConfig {
    /// The three fixed `(n_fft, hop_length)` pairs used by the
    /// multi-resolution extractor, regardless of `self.n_fft`/`hop_length`.
    pub const MULTI_RES_PARAMS: [ResolutionParams; 3] = [
        ResolutionParams { n_fft: 1024, hop_length: 256 },
        ResolutionParams { n_fft: 2048, hop_length: 512 },
        ResolutionParams { n_fft: 4096, hop_length: 1024 },
    ];

    /// Fusion weights for the three multi-resolution signatures, in
    /// `(coarse, medium, fine)` order.
    pub const MULTI_RES_WEIGHTS: (f32, f32, f32) = (0.3, 0.5, 0.2);

    /// Validate cross-field constraints. Called exactly once, by the
    /// factory, before any component is constructed from this config.
    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate == 0 {
            return Err(Error::InvalidConfig("target_sample_rate must be > 0".into()));
        }
        if self.segment_seconds <= 0.0 {
            return Err(Error::InvalidConfig("segment_seconds must be > 0".into()));
        }
        if self.n_fft == 0 || (self.n_fft & (self.n_fft - 1)) != 0 {
            return Err(Error::InvalidConfig("n_fft must be a power of two".into()));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(Error::InvalidConfig("hop_length must be in (0, n_fft]".into()));
        }
        if self.target_peak_count == 0 {
            return Err(Error::InvalidConfig("target_peak_count must be > 0".into()));
        }
        let weight_sum = self.comparator.correlation_weight + self.comparator.l2_weight;
        if (weight_sum - 1.0).abs() > 1e-4 {
            return Err(Error::InvalidConfig(format!(
                "comparator weights must sum to 1.0, got {weight_sum}"
            )));
        }
        if self.lsh.tables == 0 {
            return Err(Error::InvalidConfig("lsh.tables must be > 0".into()));
        }
        if self.lsh.hash_bits == 0 || self.lsh.hash_bits > 64 {
            return Err(Error::InvalidConfig("lsh.hash_bits must be in (0, 64]".into()));
        }
        if self.batch.queue_depth_factor == 0 {
            return Err(Error::InvalidConfig("batch.queue_depth_factor must be > 0".into()));
        }
        Ok(())
    }

    /// Vector dimension implied by `target_peak_count`.
    pub fn vector_dim(&self) -> usize {
        self.target_peak_count * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        FingerprintConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unbalanced_fusion_weights() {
        let mut cfg = FingerprintConfig::default();
        cfg.comparator.correlation_weight = 0.9;
        cfg.comparator.l2_weight = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_fft() {
        let mut cfg = FingerprintConfig::default();
        cfg.n_fft = 2000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_hop_larger_than_fft() {
        let mut cfg = FingerprintConfig::default();
        cfg.hop_length = cfg.n_fft + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let mut cfg = FingerprintConfig::default();
        cfg.use_multi_resolution = true;
        cfg.lsh.seed = 123456789;

        let json = serde_json::to_string(&cfg).unwrap();
        let restored: FingerprintConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cfg);
    }
}
