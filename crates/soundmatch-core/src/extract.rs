//! Extractor: STFT → spectrogram → peak picking → quantised signature (§4.2).

use num_complex::Complex;
use rustfft::FftPlanner;
use tracing::debug;

use crate::config::FingerprintConfig;
use crate::error::Result;
use crate::tag::compute_tag;
use crate::types::{PeakTriple, RawPeak, Segment, Signature, SignatureParams};

const EPSILON: f32 = 1e-10;

/// Produces one [`Signature`] per [`Segment`] via spectral-peak picking.
pub struct Extractor {
    n_fft: usize,
    hop_length: usize,
    target_peak_count: usize,
    peak_sigma_k: f32,
    window: Vec<f32>,
}

impl Extractor {
    /// Build an extractor for one resolution from a frozen config.
    pub fn new(cfg: &FingerprintConfig) -> Self {
        Self::with_params(cfg.n_fft, cfg.hop_length, cfg.target_peak_count, cfg.peak_sigma_k)
    }

    /// Build an extractor with explicit STFT parameters, used by the
    /// multi-resolution extractor to instantiate its three resolutions.
    pub fn with_params(n_fft: usize, hop_length: usize, target_peak_count: usize, peak_sigma_k: f32) -> Self {
        let window = hann_window(n_fft);
        Self {
            n_fft,
            hop_length,
            target_peak_count,
            peak_sigma_k,
            window,
        }
    }

    fn params(&self, sample_rate: u32, segment_seconds: f32) -> SignatureParams {
        SignatureParams {
            sample_rate,
            n_fft: self.n_fft as u32,
            hop_length: self.hop_length as u32,
            segment_seconds,
            target_peak_count: self.target_peak_count as u32,
        }
    }

    /// Extract a signature from one segment.
    ///
    /// Never fails: segments too short for one frame, or whose spectrum
    /// is degenerate (silence), produce the null signature (§4.2) rather
    /// than an error, so a single bad segment never poisons a batch.
    pub fn extract(&self, segment: &Segment) -> Result<Signature> {
        let samples = segment.samples();
        let segment_seconds = samples.len() as f32 / segment.sample_rate() as f32;
        let params = self.params(segment.sample_rate(), segment_seconds);

        if samples.len() < self.n_fft {
            debug!(len = samples.len(), n_fft = self.n_fft, "segment too short, emitting null signature");
            return Ok(Signature::null(params));
        }

        let spectrogram = self.compute_db_spectrogram(samples);
        let max_magnitude = spectrogram
            .iter()
            .flat_map(|frame| frame.iter())
            .cloned()
            .fold(0.0f32, f32::max);

        if max_magnitude < EPSILON {
            debug!("degenerate (silent) spectrum, emitting null signature");
            return Ok(Signature::null(params));
        }

        let peaks = pick_peaks(&spectrogram, self.peak_sigma_k);
        let surviving = peaks.len();

        let mut ranked = peaks;
        // Descending magnitude; ties break toward lower (t, f) per §4.2
        // step 3, which `pick_peaks` already visits in that order, so a
        // stable sort preserves the tie-break.
        ranked.sort_by(|a, b| b.magnitude.partial_cmp(&a.magnitude).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.target_peak_count);

        let peak_magnitude_max = max_linear_magnitude(samples, self.n_fft, self.hop_length);

        // `pick_peaks` ranks and thresholds in dB space (§4.2 step 3), but
        // `PeakTriple::magnitude` is documented and persisted as a linear
        // magnitude, so convert each surviving peak back here.
        let mut final_peaks: Vec<PeakTriple> = ranked
            .iter()
            .map(|p| PeakTriple {
                frame_index: p.frame_index as u32,
                freq_bin: p.freq_bin as u32,
                magnitude: db_to_linear_for_quantisation(p.magnitude),
            })
            .collect();
        final_peaks.resize(self.target_peak_count, PeakTriple::SENTINEL);

        let vector = quantise_vector(&final_peaks, peak_magnitude_max);
        let tag_bytes = vector_le_i16_bytes(&vector);
        let tag = compute_tag(&tag_bytes);

        let confidence = (surviving as f32 / self.target_peak_count as f32).clamp(0.0, 1.0);

        Ok(Signature {
            peaks: final_peaks,
            vector,
            tag,
            confidence,
            params,
            is_null: false,
        })
    }

    /// Compute the dB-scale magnitude spectrogram `S[f, t]`.
    fn compute_db_spectrogram(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(self.n_fft);

        let num_frames = 1 + (samples.len() - self.n_fft) / self.hop_length;
        let mut spectrogram = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_length;
            let frame_samples = &samples[start..start + self.n_fft];

            let mut buffer: Vec<Complex<f32>> = frame_samples
                .iter()
                .zip(self.window.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();

            fft.process(&mut buffer);

            let db: Vec<f32> = buffer[..self.n_fft / 2]
                .iter()
                .map(|c| {
                    let mag = (c.re * c.re + c.im * c.im).sqrt();
                    20.0 * mag.max(EPSILON).log10()
                })
                .collect();

            spectrogram.push(db);
        }

        spectrogram
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos()))
        .collect()
}

/// Global mean/std of a dB-scale spectrogram.
fn global_mean_std(spectrogram: &[Vec<f32>]) -> (f32, f32) {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    for frame in spectrogram {
        for &v in frame {
            sum += v as f64;
            count += 1;
        }
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let mut var_sum = 0.0f64;
    for frame in spectrogram {
        for &v in frame {
            let d = v as f64 - mean;
            var_sum += d * d;
        }
    }
    let std = (var_sum / count as f64).sqrt();
    (mean as f32, std as f32)
}

/// Find local maxima over a 3x3 frame/bin neighbourhood that also exceed
/// `mean + k*std` in dB space (§4.2 step 3).
fn pick_peaks(spectrogram: &[Vec<f32>], k: f32) -> Vec<RawPeak> {
    let (mean, std) = global_mean_std(spectrogram);
    let threshold = mean + k * std;

    let num_frames = spectrogram.len();
    let mut peaks = Vec::new();

    for t in 0..num_frames {
        let frame = &spectrogram[t];
        for f in 0..frame.len() {
            let value = frame[f];
            if value < threshold {
                continue;
            }
            if is_strict_local_max(spectrogram, t, f) {
                peaks.push(RawPeak {
                    frame_index: t,
                    freq_bin: f,
                    magnitude: value,
                });
            }
        }
    }

    peaks
}

/// A cell is a local max over its 3x3 neighbourhood if it is strictly
/// greater than every neighbour — except that on an exact tie, ties
/// break towards the lower `(t, f)` lexicographic index (§4.2 step 3):
/// a neighbour earlier in scan order beats an equal value here, while
/// this cell beats an equal value at a neighbour later in scan order.
fn is_strict_local_max(spectrogram: &[Vec<f32>], t: usize, f: usize) -> bool {
    let value = spectrogram[t][f];
    let num_frames = spectrogram.len();
    let num_bins = spectrogram[t].len();

    for dt in -1isize..=1 {
        for df in -1isize..=1 {
            if dt == 0 && df == 0 {
                continue;
            }
            let nt = t as isize + dt;
            let nf = f as isize + df;
            if nt < 0 || nf < 0 || nt as usize >= num_frames || nf as usize >= num_bins {
                continue;
            }
            let (nt, nf) = (nt as usize, nf as usize);
            let neighbour_value = spectrogram[nt][nf];
            let neighbour_is_earlier = (nt, nf) < (t, f);

            if neighbour_is_earlier {
                if neighbour_value >= value {
                    return false;
                }
            } else if neighbour_value > value {
                return false;
            }
        }
    }
    true
}

/// Largest linear-scale magnitude anywhere in the segment's spectrogram,
/// used to contrast-normalise the magnitude quantisation (§4.2 step 5).
fn max_linear_magnitude(samples: &[f32], n_fft: usize, hop_length: usize) -> f32 {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let num_frames = 1 + (samples.len() - n_fft) / hop_length;
    let mut max_mag = EPSILON;

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        let mut buffer: Vec<Complex<f32>> = samples[start..start + n_fft]
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buffer);
        for c in &buffer[..n_fft / 2] {
            let mag = (c.re * c.re + c.im * c.im).sqrt();
            if mag > max_mag {
                max_mag = mag;
            }
        }
    }

    max_mag
}

/// Flatten peaks into `[frame_0, freq_0, mag_0, frame_1, ...]` and
/// quantise each component to `[0, 65535]` (§4.2 step 5). `frame` wraps
/// mod 2^16, `freq` passes through directly, `magnitude` (already linear,
/// per [`PeakTriple::magnitude`]) is linearly mapped by the segment's own
/// max linear magnitude.
fn quantise_vector(peaks: &[PeakTriple], peak_magnitude_max: f32) -> Vec<f32> {
    let mut vector = Vec::with_capacity(peaks.len() * 3);
    for p in peaks {
        let frame_q = (p.frame_index % 65536) as f32;
        let freq_q = p.freq_bin as f32;
        let mag_q = if peak_magnitude_max > EPSILON {
            ((p.magnitude / peak_magnitude_max).clamp(0.0, 1.0) * 65535.0).round()
        } else {
            0.0
        };
        vector.push(frame_q);
        vector.push(freq_q);
        vector.push(mag_q);
    }
    vector
}

/// Peak magnitudes are carried in dB through peak picking (§4.2 step 2-3)
/// but quantised from a linear contrast ratio (step 5); convert back to a
/// non-negative linear-ish scale for the ratio computation.
fn db_to_linear_for_quantisation(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Little-endian `i16` byte encoding of a quantised vector, matching the
/// on-disk `vector` field's byte layout, for tag computation.
fn vector_le_i16_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 2);
    for &v in vector {
        let q = v.round().clamp(0.0, 65535.0) as u16;
        bytes.extend_from_slice(&(q as i16).to_le_bytes());
    }
    bytes
}
