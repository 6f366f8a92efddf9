//! Comparator: fused correlation + L2 similarity and deterministic
//! ranking (§4.4).

use crate::config::{ComparatorConfig, FingerprintConfig};
use crate::error::{Error, Result};
use crate::types::{MatchResult, RankCandidate, Signature, Similarity};
#[cfg(feature = "multi-resolution")]
use crate::multires::MultiResSignature;

/// Scores pairs of signatures and ranks candidate sets against a gating
/// policy.
pub struct Comparator {
    cfg: ComparatorConfig,
}

impl Comparator {
    /// Build a comparator from its slice of the frozen config.
    pub fn new(cfg: ComparatorConfig) -> Self {
        Self { cfg }
    }

    /// Compare two signatures produced under the same `params`.
    ///
    /// Null signatures (§4.2) always score 0 without error, even against
    /// a signature produced under different params — they carry no
    /// spectral content to compare.
    pub fn compare(&self, a: &Signature, b: &Signature) -> Result<Similarity> {
        if a.is_null || b.is_null {
            return Ok(Similarity { score: 0.0, correlation: 0.0, l2_similarity: 0.0 });
        }
        if a.params != b.params {
            return Err(Error::ParamsMismatch { a: a.params, b: b.params });
        }

        let r = pearson_correlation(&a.vector, &b.vector);
        let l = l2_similarity(&a.vector, &b.vector);
        let score = self.cfg.correlation_weight * r.max(0.0) + self.cfg.l2_weight * l;

        Ok(Similarity { score, correlation: r, l2_similarity: l })
    }

    /// Compare two [`MultiResSignature`]s, fusing the per-resolution
    /// similarities with `FingerprintConfig::MULTI_RES_WEIGHTS` (§4.3):
    /// `sim = w_c·sim(sig_c) + w_m·sim(sig_m) + w_f·sim(sig_f)`.
    ///
    /// Each resolution is compared independently with [`Comparator::compare`],
    /// so a params mismatch at any one resolution fails the whole
    /// comparison before the others are even evaluated.
    #[cfg(feature = "multi-resolution")]
    pub fn compare_multi(&self, a: &MultiResSignature, b: &MultiResSignature) -> Result<Similarity> {
        let (w_c, w_m, w_f) = FingerprintConfig::MULTI_RES_WEIGHTS;

        let coarse = self.compare(&a.coarse, &b.coarse)?;
        let medium = self.compare(&a.medium, &b.medium)?;
        let fine = self.compare(&a.fine, &b.fine)?;

        Ok(Similarity {
            score: w_c * coarse.score + w_m * medium.score + w_f * fine.score,
            correlation: w_c * coarse.correlation + w_m * medium.correlation + w_f * fine.correlation,
            l2_similarity: w_c * coarse.l2_similarity + w_m * medium.l2_similarity + w_f * fine.l2_similarity,
        })
    }

    /// Rank `candidates` against `query`, keeping only those that pass
    /// all four gates (§4.4), in deterministic descending order.
    pub fn rank(&self, query: &Signature, candidates: &[RankCandidate<'_>]) -> Result<Vec<MatchResult>> {
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let sim = self.compare(query, candidate.signature)?;
            let passes = sim.correlation >= self.cfg.correlation_threshold
                && sim.l2_similarity >= self.cfg.l2_threshold
                && sim.score >= self.cfg.min_score
                && candidate.duration_seconds >= self.cfg.min_duration;

            if passes {
                results.push(MatchResult {
                    identifier: candidate.identifier.to_vec(),
                    score: sim.score,
                    correlation: sim.correlation,
                    l2_similarity: sim.l2_similarity,
                    duration_seconds: candidate.duration_seconds,
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.correlation.partial_cmp(&a.correlation).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.l2_similarity.partial_cmp(&a.l2_similarity).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| {
                    b.duration_seconds
                        .partial_cmp(&a.duration_seconds)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        Ok(results)
    }
}

/// Pearson correlation in 64-bit float. Zero if either vector has zero
/// variance.
fn pearson_correlation(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len() as f64;
    if n == 0.0 {
        return 0.0;
    }

    let mean_a: f64 = a.iter().map(|&x| x as f64).sum::<f64>() / n;
    let mean_b: f64 = b.iter().map(|&x| x as f64).sum::<f64>() / n;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }

    (cov / (var_a.sqrt() * var_b.sqrt())) as f32
}

/// `l = 1 / (1 + ||a - b||_2 / D)`.
fn l2_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let d = a.len() as f64;
    if d == 0.0 {
        return 1.0;
    }
    let sum_sq: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum();
    let dist = sum_sq.sqrt();
    (1.0 / (1.0 + dist / d)) as f32
}
