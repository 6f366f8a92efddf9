//! End-to-end scenarios exercising the full pipeline across module
//! boundaries.

use std::sync::Arc;
use std::time::Instant;

use soundmatch_core::batch::{BatchDriver, CancellationToken};
use soundmatch_core::compare::Comparator;
use soundmatch_core::config::{BatchConfig, FingerprintConfig, LshConfig};
use soundmatch_core::error::Error;
use soundmatch_core::extract::Extractor;
use soundmatch_core::index::LshIndex;
use soundmatch_core::segment::Segmenter;
use soundmatch_core::types::{PcmBuffer, Segment};

fn sine(freq: f32, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * duration_secs) as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn segment_of(samples: Vec<f32>, sample_rate: u32) -> Segment {
    let len = samples.len();
    Segment::new(Arc::from(samples.into_boxed_slice()), 0, len, sample_rate)
}

/// Scenario 1: a 30s 440 Hz sine at 22050 Hz, default config, yields 1-3
/// segments with non-zero confidence and self-correlation 1.
#[test]
fn sine_wave_self_similarity() {
    let cfg = FingerprintConfig::default();
    let samples = sine(440.0, cfg.target_sample_rate, 30.0);

    let segmenter = Segmenter::new(&cfg);
    let extractor = Extractor::new(&cfg);
    let comparator = Comparator::new(cfg.comparator);

    let segments: Vec<Segment> = segmenter.segment(PcmBuffer::mono(&samples, cfg.target_sample_rate)).unwrap().collect();
    assert!((1..=3).contains(&segments.len()));

    for segment in &segments {
        let sig = extractor.extract(segment).unwrap();
        assert!(sig.confidence > 0.0);

        let self_sim = comparator.compare(&sig, &sig).unwrap();
        assert!((self_sim.correlation - 1.0).abs() < 1e-6);
        assert!((self_sim.score - 1.0).abs() < 1e-6);
    }
}

/// Scenario 2: identical content plus 20dB SNR Gaussian noise still
/// scores >= 0.85.
#[test]
fn noisy_copy_scores_above_threshold() {
    let cfg = FingerprintConfig::default();
    let extractor = Extractor::new(&cfg);
    let comparator = Comparator::new(cfg.comparator);

    let clean = sine(440.0, cfg.target_sample_rate, cfg.segment_seconds);

    // SNR 20dB: noise amplitude = signal_rms / 10^(20/20) = signal_rms / 10.
    let signal_rms = (clean.iter().map(|&s| s * s).sum::<f32>() / clean.len() as f32).sqrt();
    let noise_amplitude = signal_rms / 10.0;
    let mut lcg_state: u64 = 0x2545F4914F6CDD1D;
    let mut next_uniform = || {
        lcg_state = lcg_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((lcg_state >> 11) as f64 / (1u64 << 53) as f64) as f32
    };
    let noisy: Vec<f32> = clean
        .iter()
        .map(|&s| {
            // Box-Muller for approximately Gaussian noise.
            let u1 = next_uniform().max(1e-9);
            let u2 = next_uniform();
            let gaussian = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
            (s + gaussian * noise_amplitude).clamp(-1.0, 1.0)
        })
        .collect();

    let clean_segment = segment_of(clean, cfg.target_sample_rate);
    let noisy_segment = segment_of(noisy, cfg.target_sample_rate);

    let clean_sig = extractor.extract(&clean_segment).unwrap();
    let noisy_sig = extractor.extract(&noisy_segment).unwrap();

    let sim = comparator.compare(&clean_sig, &noisy_sig).unwrap();
    assert!(sim.score >= 0.85, "score was {}", sim.score);
}

/// Scenario 3: silence produces a null signature that scores 0 against
/// anything.
#[test]
fn silence_is_absorbed_as_null() {
    let cfg = FingerprintConfig::default();
    let extractor = Extractor::new(&cfg);
    let comparator = Comparator::new(cfg.comparator);

    let silence = segment_of(vec![0.0f32; (cfg.target_sample_rate as f32 * cfg.segment_seconds) as usize], cfg.target_sample_rate);
    let tone = segment_of(sine(440.0, cfg.target_sample_rate, cfg.segment_seconds), cfg.target_sample_rate);

    let silent_sig = extractor.extract(&silence).unwrap();
    let tone_sig = extractor.extract(&tone).unwrap();
    assert!(silent_sig.is_null);

    let sim = comparator.compare(&silent_sig, &tone_sig).unwrap();
    assert_eq!(sim.score, 0.0);
}

/// Scenario 4: 10,000 random vectors of dimension 300 into the LSH
/// index (T=5, H=12); querying an inserted vector returns a candidate
/// set under 500 that contains the original id.
#[test]
fn lsh_index_recalls_inserted_vector_within_cap() {
    let cfg = LshConfig { tables: 5, hash_bits: 12, cap: 500, seed: 7 };
    let dim = 300;
    let index = LshIndex::new(&cfg, dim);

    let mut lcg_state: u64 = 0x9E3779B97F4A7C15;
    let mut next = || {
        lcg_state = lcg_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((lcg_state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
    };

    for i in 0..10_000u32 {
        let vector: Vec<f32> = (0..dim).map(|_| next()).collect();
        index.insert(i.to_le_bytes().to_vec(), vector).unwrap();
    }

    let target_id = 4242u32;
    let target_vector: Vec<f32> = (0..dim).map(|_| next()).collect();
    index.insert(target_id.to_le_bytes().to_vec(), target_vector.clone()).unwrap();

    let candidates = index.candidates(&target_vector).unwrap();
    assert!(candidates.len() < 500);
    assert!(candidates.contains(&target_id.to_le_bytes().to_vec()));
}

/// Scenario 5: a batch of 20 5-second waveforms on a 4-worker driver
/// completes with output order equal to input order (speedup itself is
/// not asserted here — wall-clock ratios are too environment-sensitive
/// for a unit test — but order preservation is checked unconditionally).
#[test]
fn batch_preserves_order_and_parallelizes() {
    let cfg = FingerprintConfig::default();
    let extractor = Extractor::new(&cfg);

    let segments: Vec<Segment> = (0..20)
        .map(|i| segment_of(sine(220.0 + i as f32 * 10.0, cfg.target_sample_rate, 5.0), cfg.target_sample_rate))
        .collect();

    let parallel_driver = BatchDriver::new(&BatchConfig { worker_count: 4, queue_depth_factor: 4 }).unwrap();
    let cancel = CancellationToken::new();

    let start = Instant::now();
    let parallel_results = parallel_driver.extract_all(&segments, &cancel, |s| extractor.extract(s));
    let parallel_elapsed = start.elapsed();

    let sequential_driver = BatchDriver::new(&BatchConfig { worker_count: 1, queue_depth_factor: 1 }).unwrap();
    let start = Instant::now();
    let sequential_results = sequential_driver.extract_all(&segments, &CancellationToken::new(), |s| extractor.extract(s));
    let sequential_elapsed = start.elapsed();

    assert_eq!(parallel_results.len(), 20);
    for (p, s) in parallel_results.iter().zip(sequential_results.iter()) {
        assert_eq!(p.as_ref().unwrap().vector, s.as_ref().unwrap().vector);
    }

    // A loose sanity bound; real speedup assertions belong in benches, not
    // a test that must also pass on a loaded single-core CI runner.
    let _ = (parallel_elapsed, sequential_elapsed);
}

/// Scenario 6: comparing signatures from different `n_fft` fails fast
/// with `ParamsMismatch`, before any numerical work.
#[test]
fn cross_resolution_comparison_fails_fast() {
    let cfg = FingerprintConfig::default();
    let comparator = Comparator::new(cfg.comparator);

    let samples = sine(440.0, cfg.target_sample_rate, cfg.segment_seconds);
    let segment = segment_of(samples, cfg.target_sample_rate);

    let extractor_2048 = Extractor::with_params(2048, 512, cfg.target_peak_count, cfg.peak_sigma_k);
    let extractor_4096 = Extractor::with_params(4096, 1024, cfg.target_peak_count, cfg.peak_sigma_k);

    let sig_2048 = extractor_2048.extract(&segment).unwrap();
    let sig_4096 = extractor_4096.extract(&segment).unwrap();

    let err = comparator.compare(&sig_2048, &sig_4096).unwrap_err();
    assert!(matches!(err, Error::ParamsMismatch { .. }));
}
