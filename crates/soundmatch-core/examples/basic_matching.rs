//! Basic Fingerprint Matching Example
//!
//! Demonstrates segmenting a synthetic waveform, extracting signatures,
//! indexing them, and querying for a match.
//!
//! # Usage
//! ```bash
//! cargo run --example basic_matching
//! ```

use anyhow::Result;
use soundmatch_core::{FingerprintConfig, FingerprinterFactory, PcmBuffer};

fn sine(freq: f32, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * duration_secs) as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = FingerprintConfig::default();
    let fp = FingerprinterFactory::build(&cfg)?;

    let library_tone = sine(440.0, cfg.target_sample_rate, 30.0);
    let segments: Vec<_> = fp.segmenter.segment(PcmBuffer::mono(&library_tone, cfg.target_sample_rate))?.collect();

    let extractor = match &fp.extractor {
        soundmatch_core::AnyExtractor::Single(e) => e,
        #[cfg(feature = "multi-resolution")]
        soundmatch_core::AnyExtractor::MultiRes(_) => {
            anyhow::bail!("this example expects single-resolution extraction")
        }
    };

    for (i, segment) in segments.iter().enumerate() {
        let sig = extractor.extract(segment)?;
        fp.lsh_index.insert(format!("segment-{i}").into_bytes(), sig.vector.clone())?;
        println!("indexed segment-{i}: confidence={:.3}", sig.confidence);
    }

    let query_tone = sine(440.0, cfg.target_sample_rate, cfg.segment_seconds);
    let query_segment = fp
        .segmenter
        .segment(PcmBuffer::mono(&query_tone, cfg.target_sample_rate))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("query tone too short to yield a segment"))?;
    let query_sig = extractor.extract(&query_segment)?;

    let candidates = fp.lsh_index.candidates(&query_sig.vector)?;
    println!("query matched {} candidate(s): {:?}", candidates.len(), candidates);

    Ok(())
}
