//! Segmenter: fixed-length windowing of mono PCM at the target rate (§4.1).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::FingerprintConfig;
use crate::error::{Error, Result};
use crate::types::{PcmBuffer, Segment};

/// Fraction of non-finite samples above which the segmenter refuses the
/// input outright, rather than silently zeroing a dominant portion of it.
const NON_FINITE_FAILURE_THRESHOLD: f32 = 0.01;

/// Slices PCM into fixed-length [`Segment`]s, resampling to
/// `cfg.target_sample_rate` and downmixing to mono first.
pub struct Segmenter {
    target_sample_rate: u32,
    segment_len: usize,
    pad_tail: bool,
}

impl Segmenter {
    /// Build a segmenter from a frozen config.
    pub fn new(cfg: &FingerprintConfig) -> Self {
        let segment_len = (cfg.segment_seconds * cfg.target_sample_rate as f32).round() as usize;
        Self {
            target_sample_rate: cfg.target_sample_rate,
            segment_len,
            pad_tail: cfg.pad_tail,
        }
    }

    /// Segment `pcm`, producing an iterator of contiguous, non-overlapping
    /// windows in time order.
    pub fn segment(&self, pcm: PcmBuffer<'_>) -> Result<SegmentIter> {
        let mono = downmix_to_mono(pcm.samples, pcm.channels);
        let (cleaned, non_finite_fraction) = scrub_non_finite(&mono);
        if non_finite_fraction > NON_FINITE_FAILURE_THRESHOLD {
            return Err(Error::CorruptInput { non_finite_fraction });
        }
        if non_finite_fraction > 0.0 {
            warn!(non_finite_fraction, "replaced non-finite samples with 0");
        }

        let resampled = if pcm.sample_rate == self.target_sample_rate {
            cleaned
        } else {
            resample_linear_phase(&cleaned, pcm.sample_rate, self.target_sample_rate)
        };

        if resampled.len() < self.segment_len && !self.pad_tail {
            return Err(Error::TooShort {
                available: resampled.len(),
                required: self.segment_len,
            });
        }

        let buffer: Arc<[f32]> = if self.pad_tail && resampled.len() % self.segment_len != 0 {
            let remainder = resampled.len() % self.segment_len;
            let pad = self.segment_len - remainder;
            let mut padded = resampled;
            padded.extend(std::iter::repeat(0.0f32).take(pad));
            padded.into()
        } else {
            resampled.into()
        };

        let num_segments = buffer.len() / self.segment_len;
        debug!(num_segments, segment_len = self.segment_len, "segmented buffer");

        Ok(SegmentIter {
            buffer,
            segment_len: self.segment_len,
            sample_rate: self.target_sample_rate,
            next_segment: 0,
            num_segments,
        })
    }
}

/// Lazy, deterministic iterator over a segmented, resampled buffer.
pub struct SegmentIter {
    buffer: Arc<[f32]>,
    segment_len: usize,
    sample_rate: u32,
    next_segment: usize,
    num_segments: usize,
}

impl Iterator for SegmentIter {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.next_segment >= self.num_segments {
            return None;
        }
        let start = self.next_segment * self.segment_len;
        self.next_segment += 1;
        Some(Segment::new(
            Arc::clone(&self.buffer),
            start,
            self.segment_len,
            self.sample_rate,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_segments - self.next_segment;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentIter {}

fn downmix_to_mono(samples: &[f32], channels: u32) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Replace NaN/±inf samples with 0, returning the cleaned buffer and the
/// fraction of samples that were replaced.
fn scrub_non_finite(samples: &[f32]) -> (Vec<f32>, f32) {
    if samples.is_empty() {
        return (Vec::new(), 0.0);
    }
    let mut bad = 0usize;
    let cleaned: Vec<f32> = samples
        .iter()
        .map(|&s| {
            if s.is_finite() {
                s
            } else {
                bad += 1;
                0.0
            }
        })
        .collect();
    (cleaned, bad as f32 / samples.len() as f32)
}

/// Windowed-sinc polyphase resampler. `input_rate`/`output_rate` are
/// reduced to a coprime ratio `L/M` (upsample by `L`, downsample by `M`),
/// and a single lowpass filter at `min(input_rate, output_rate) / 2` is
/// applied per output phase, so only one filter tap set is ever built
/// regardless of buffer length.
fn resample_linear_phase(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    if samples.is_empty() || input_rate == output_rate {
        return samples.to_vec();
    }

    let g = gcd(input_rate, output_rate);
    let up = (output_rate / g) as usize;
    let down = (input_rate / g) as usize;

    // 8 cycles of the lower of the two rates' Nyquist gives a filter long
    // enough for a sub-0.5dB in-band ripple at the default sample rates.
    const HALF_TAPS_CYCLES: usize = 8;
    let taps_per_phase = HALF_TAPS_CYCLES * 2 + 1;
    let filter = windowed_sinc_lowpass(up, taps_per_phase);

    let out_len = (samples.len() * up) / down;
    let mut out = Vec::with_capacity(out_len);

    for n in 0..out_len {
        // Position in the upsampled-by-`up` timeline this output sample
        // corresponds to.
        let t = n * down;
        let phase = t % up;
        let center_input_idx = t / up;

        let mut acc = 0.0f32;
        let half = HALF_TAPS_CYCLES as isize;
        for k in -half..=half {
            let input_idx = center_input_idx as isize + k;
            if input_idx < 0 || input_idx as usize >= samples.len() {
                continue;
            }
            let tap_idx = (k + half) as usize;
            acc += samples[input_idx as usize] * filter[phase][tap_idx];
        }
        out.push(acc);
    }

    out
}

/// Per-phase windowed-sinc lowpass filter bank for a polyphase
/// interpolator with `up` phases and `taps_per_phase` taps each.
fn windowed_sinc_lowpass(up: usize, taps_per_phase: usize) -> Vec<Vec<f32>> {
    let half = (taps_per_phase / 2) as isize;
    (0..up)
        .map(|phase| {
            (0..taps_per_phase)
                .map(|i| {
                    let k = i as isize - half;
                    // Fractional offset of this tap from the ideal sample
                    // instant, in units of the *input* grid.
                    let x = k as f32 - phase as f32 / up as f32;
                    let sinc = if x.abs() < 1e-8 { 1.0 } else { (std::f32::consts::PI * x).sin() / (std::f32::consts::PI * x) };
                    // Hann window over the tap span.
                    let w = 0.5
                        - 0.5
                            * (2.0 * std::f32::consts::PI * (i as f32) / (taps_per_phase.max(2) - 1) as f32)
                                .cos();
                    sinc * w
                })
                .collect()
        })
        .collect()
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn coverage_without_pad_tail() {
        let cfg = FingerprintConfig {
            segment_seconds: 1.0,
            pad_tail: false,
            ..FingerprintConfig::default()
        };
        let samples = sine(440.0, cfg.target_sample_rate, 3.5);
        let segmenter = Segmenter::new(&cfg);
        let pcm = PcmBuffer::mono(&samples, cfg.target_sample_rate);
        let segments: Vec<_> = segmenter.segment(pcm).unwrap().collect();
        assert_eq!(segments.len(), samples.len() / segmenter.segment_len);
    }

    #[test]
    fn coverage_with_pad_tail() {
        let cfg = FingerprintConfig {
            segment_seconds: 1.0,
            pad_tail: true,
            ..FingerprintConfig::default()
        };
        let samples = sine(440.0, cfg.target_sample_rate, 3.5);
        let segmenter = Segmenter::new(&cfg);
        let pcm = PcmBuffer::mono(&samples, cfg.target_sample_rate);
        let segments: Vec<_> = segmenter.segment(pcm).unwrap().collect();
        let expected = (samples.len() as f64 / segmenter.segment_len as f64).ceil() as usize;
        assert_eq!(segments.len(), expected);
    }

    #[test]
    fn determinism() {
        let cfg = FingerprintConfig::default();
        let samples = sine(440.0, cfg.target_sample_rate, 5.0);
        let segmenter = Segmenter::new(&cfg);

        let a: Vec<Vec<f32>> = segmenter
            .segment(PcmBuffer::mono(&samples, cfg.target_sample_rate))
            .unwrap()
            .map(|s| s.samples().to_vec())
            .collect();
        let b: Vec<Vec<f32>> = segmenter
            .segment(PcmBuffer::mono(&samples, cfg.target_sample_rate))
            .unwrap()
            .map(|s| s.samples().to_vec())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn too_short_without_pad_tail_fails() {
        let cfg = FingerprintConfig::default();
        let samples = vec![0.0f32; 100];
        let segmenter = Segmenter::new(&cfg);
        let err = segmenter
            .segment(PcmBuffer::mono(&samples, cfg.target_sample_rate))
            .unwrap_err();
        assert!(matches!(err, Error::TooShort { .. }));
    }

    #[test]
    fn corrupt_input_rejected() {
        let cfg = FingerprintConfig::default();
        let mut samples = vec![0.1f32; 100_000];
        for s in samples.iter_mut().take(samples.len() / 2) {
            *s = f32::NAN;
        }
        let segmenter = Segmenter::new(&cfg);
        let err = segmenter
            .segment(PcmBuffer::mono(&samples, cfg.target_sample_rate))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptInput { .. }));
    }

    #[test]
    fn mono_downmix_averages_channels() {
        let interleaved = vec![1.0f32, -1.0, 0.5, -0.5];
        let mono = downmix_to_mono(&interleaved, 2);
        assert_eq!(mono, vec![0.0, 0.0]);
    }

    #[test]
    fn resample_preserves_frequency_content() {
        let input_rate = 44100;
        let output_rate = 22050;
        let samples = sine(440.0, input_rate, 2.0);
        let resampled = resample_linear_phase(&samples, input_rate, output_rate);

        // Roughly half the sample count after a 2:1 downsample.
        let expected_len = samples.len() * (output_rate as usize) / (input_rate as usize);
        assert!((resampled.len() as isize - expected_len as isize).abs() < 10);
    }
}
