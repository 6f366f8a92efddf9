//! Multi-resolution extractor: three parallel STFT resolutions fused at
//! compare time (§4.3).

use crate::config::{FingerprintConfig, IndexedResolution};
use crate::error::Result;
use crate::extract::Extractor;
use crate::types::{Segment, Signature};

/// The three signatures produced by [`MultiResExtractor`] for one
/// segment, at coarse/medium/fine FFT resolutions.
#[derive(Debug, Clone)]
pub struct MultiResSignature {
    pub coarse: Signature,
    pub medium: Signature,
    pub fine: Signature,
}

impl MultiResSignature {
    /// The signature the [`crate::index::LshIndex`] stores for this
    /// segment, per the configured [`IndexedResolution`].
    pub fn indexed(&self, which: IndexedResolution) -> &Signature {
        match which {
            IndexedResolution::Coarse => &self.coarse,
            IndexedResolution::Medium => &self.medium,
            IndexedResolution::Fine => &self.fine,
        }
    }
}

/// Runs three independent [`Extractor`]s at `(1024, 256)`, `(2048, 512)`,
/// and `(4096, 1024)` over the same segment.
pub struct MultiResExtractor {
    coarse: Extractor,
    medium: Extractor,
    fine: Extractor,
}

impl MultiResExtractor {
    /// Build from a frozen config; STFT sizes are the spec's fixed
    /// triple, not `cfg.n_fft`/`cfg.hop_length`.
    pub fn new(cfg: &FingerprintConfig) -> Self {
        let [coarse_p, medium_p, fine_p] = FingerprintConfig::MULTI_RES_PARAMS;
        Self {
            coarse: Extractor::with_params(coarse_p.n_fft, coarse_p.hop_length, cfg.target_peak_count, cfg.peak_sigma_k),
            medium: Extractor::with_params(medium_p.n_fft, medium_p.hop_length, cfg.target_peak_count, cfg.peak_sigma_k),
            fine: Extractor::with_params(fine_p.n_fft, fine_p.hop_length, cfg.target_peak_count, cfg.peak_sigma_k),
        }
    }

    /// Extract all three resolutions for one segment.
    pub fn extract(&self, segment: &Segment) -> Result<MultiResSignature> {
        Ok(MultiResSignature {
            coarse: self.coarse.extract(segment)?,
            medium: self.medium.extract(segment)?,
            fine: self.fine.extract(segment)?,
        })
    }
}
