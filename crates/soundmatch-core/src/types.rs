//! Core data types for the fingerprinting and matching pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A read-only view of decoded PCM audio handed to the core by the
/// (out-of-scope) ingestion layer. The core never retains the caller's
/// backing memory beyond the call that receives it.
#[derive(Debug, Clone, Copy)]
pub struct PcmBuffer<'a> {
    /// Samples in `[-1.0, 1.0]`, interleaved if `channels > 1`.
    pub samples: &'a [f32],
    /// Sample rate of `samples`, in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u32,
}

impl<'a> PcmBuffer<'a> {
    /// Create a mono PCM buffer view.
    pub fn mono(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }
}

/// An immutable, fixed-length window of mono PCM at the target sample
/// rate, produced by the [`crate::segment::Segmenter`].
///
/// Segments never borrow the caller's buffer directly: the segmenter
/// downmixes/resamples into its own owned allocation first, and every
/// `Segment` shares that allocation via [`Arc`] so windows can be handed
/// across threads (the batch driver) without copying sample data.
#[derive(Debug, Clone)]
pub struct Segment {
    buffer: Arc<[f32]>,
    start_sample: usize,
    length: usize,
    sample_rate: u32,
}

impl Segment {
    pub(crate) fn new(buffer: Arc<[f32]>, start_sample: usize, length: usize, sample_rate: u32) -> Self {
        debug_assert!(start_sample + length <= buffer.len());
        Self {
            buffer,
            start_sample,
            length,
            sample_rate,
        }
    }

    /// The mono PCM samples covered by this segment.
    pub fn samples(&self) -> &[f32] {
        &self.buffer[self.start_sample..self.start_sample + self.length]
    }

    /// Offset of this segment's first sample within the resampled buffer.
    pub fn start_sample(&self) -> usize {
        self.start_sample
    }

    /// Number of samples in this segment.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Sample rate of this segment's samples, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// The parameter tuple a [`Signature`] was produced under. Two signatures
/// are only comparable when their params are equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureParams {
    pub sample_rate: u32,
    pub n_fft: u32,
    pub hop_length: u32,
    pub segment_seconds: f32,
    pub target_peak_count: u32,
}

impl SignatureParams {
    /// Vector dimension implied by these params: `target_peak_count * 3`.
    pub fn vector_dim(&self) -> usize {
        self.target_peak_count as usize * 3
    }
}

/// One spectral peak: `(frame_index, freq_bin, magnitude)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakTriple {
    /// Monotonically non-decreasing frame index within the segment.
    pub frame_index: u32,
    /// Frequency bin in `[0, n_fft/2)`.
    pub freq_bin: u32,
    /// Non-negative, finite magnitude in linear (not dB) units.
    pub magnitude: f32,
}

impl PeakTriple {
    /// The zero-contribution sentinel used to pad a short-fall of peaks.
    pub const SENTINEL: PeakTriple = PeakTriple {
        frame_index: 0,
        freq_bin: 0,
        magnitude: 0.0,
    };
}

/// A 128-bit deterministic integrity tag over a signature's quantised
/// vector bytes. Equality implies vector equality; collisions (vanishingly
/// unlikely but not cryptographically infeasible) are handled by falling
/// through to a direct `vector` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrityTag(pub [u8; 16]);

impl IntegrityTag {
    /// Sentinel tag assigned to null signatures.
    pub const NULL: IntegrityTag = IntegrityTag([0u8; 16]);
}

/// The core's fingerprint of one segment: spectral peaks, a quantised
/// dense vector (the canonical form for all distance computations), an
/// integrity tag, and a confidence hint.
///
/// A signature is immutable once produced and is only meaningful in the
/// context of its `params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Ordered peaks, padded to `params.target_peak_count` with
    /// [`PeakTriple::SENTINEL`] when fewer peaks survive picking.
    pub peaks: Vec<PeakTriple>,
    /// Dense vector of length `params.vector_dim()`, holding the
    /// quantised `(frame, freq_bin, magnitude)` triples flattened and
    /// cast to `f32` for downstream arithmetic.
    pub vector: Vec<f32>,
    /// Integrity tag over the quantised vector's byte representation.
    pub tag: IntegrityTag,
    /// Quality hint in `[0, 1]`: fraction of `target_peak_count` that
    /// actually survived peak picking. Never used as a similarity.
    pub confidence: f32,
    pub params: SignatureParams,
    /// Set for the sentinel signature emitted for silent/degenerate
    /// segments (§4.2). A null signature always compares as score 0
    /// against any other signature, even one produced under different
    /// params, which is why this is a flag rather than inferred from
    /// `tag == IntegrityTag::NULL` (a real all-silence signature could
    /// otherwise collide with the sentinel tag).
    pub is_null: bool,
}

impl Signature {
    /// Build the null (sentinel) signature for a degenerate or
    /// too-short segment.
    pub fn null(params: SignatureParams) -> Self {
        let peaks = vec![PeakTriple::SENTINEL; params.target_peak_count as usize];
        let vector = vec![0.0f32; params.vector_dim()];
        Self {
            peaks,
            vector,
            tag: IntegrityTag::NULL,
            confidence: 0.0,
            params,
            is_null: true,
        }
    }
}

/// `(frame_index, freq_bin, magnitude)` spectral peak view used while
/// picking peaks, before they are quantised into a [`Signature`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawPeak {
    pub frame_index: usize,
    pub freq_bin: usize,
    pub magnitude: f32,
}

/// Fused comparison of two signatures, as produced by
/// [`crate::compare::Comparator::compare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Fused score in `[0, 1]`.
    pub score: f32,
    /// Clipped-at-zero Pearson correlation component.
    pub correlation: f32,
    /// Normalised L2 similarity component.
    pub l2_similarity: f32,
}

/// One ranked match, as produced by [`crate::compare::Comparator::rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub identifier: Vec<u8>,
    pub score: f32,
    pub correlation: f32,
    pub l2_similarity: f32,
    pub duration_seconds: f64,
}

/// A candidate handed into [`crate::compare::Comparator::rank`]: the
/// opaque identifier, its signature, and its duration (used by the
/// `min_duration` gate).
#[derive(Debug, Clone)]
pub struct RankCandidate<'a> {
    pub identifier: &'a [u8],
    pub signature: &'a Signature,
    pub duration_seconds: f64,
}
