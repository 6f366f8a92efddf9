//! On-disk signature blob encoding (§6).
//!
//! The layout is little-endian and packed, stable across versions within
//! a major release. Byte layout is hand-packed with `to_le_bytes`, the
//! same style the teacher's `Fingerprinter::compute_hash` uses to build
//! its SHA-256 preimage — no external binary-serialization crate.
//!
//! ```text
//! magic          : 4 bytes  "SHFP"
//! version        : u16
//! params         : { sample_rate: u32, n_fft: u32, hop_length: u32,
//!                    segment_seconds: f32, target_peak_count: u32 }
//! peak_count     : u32
//! peaks[peak_count] : { frame: u32, bin: u16, magnitude_q16: u16 }
//! vector_dim     : u32
//! vector[vector_dim] : i16
//! tag            : 16 bytes
//! confidence_q16 : u16
//! ```

use crate::error::{Error, Result};
use crate::types::{IntegrityTag, PeakTriple, Signature, SignatureParams};

const MAGIC: &[u8; 4] = b"SHFP";
const VERSION: u16 = 1;

/// Map a quantised value in `[0, 65535]` to the `i16` on-disk slot by
/// bit-reinterpreting the `u16` pattern (not a numeric cast, so the full
/// range round-trips exactly).
fn q16_to_i16(v: u16) -> i16 {
    v as i16
}

fn i16_to_q16(v: i16) -> u16 {
    v as u16
}

/// Encode a [`Signature`] into the stable on-disk blob format.
pub fn encode(sig: &Signature) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        4 + 2 + 20 + 4 + sig.peaks.len() * 8 + 4 + sig.vector.len() * 2 + 16 + 2,
    );

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());

    out.extend_from_slice(&sig.params.sample_rate.to_le_bytes());
    out.extend_from_slice(&sig.params.n_fft.to_le_bytes());
    out.extend_from_slice(&sig.params.hop_length.to_le_bytes());
    out.extend_from_slice(&sig.params.segment_seconds.to_le_bytes());
    out.extend_from_slice(&sig.params.target_peak_count.to_le_bytes());

    out.extend_from_slice(&(sig.peaks.len() as u32).to_le_bytes());
    for peak in &sig.peaks {
        out.extend_from_slice(&peak.frame_index.to_le_bytes());
        out.extend_from_slice(&(peak.freq_bin as u16).to_le_bytes());
        let magnitude_q16 = peak.magnitude.round().clamp(0.0, 65535.0) as u16;
        out.extend_from_slice(&magnitude_q16.to_le_bytes());
    }

    out.extend_from_slice(&(sig.vector.len() as u32).to_le_bytes());
    for &v in &sig.vector {
        let q = v.round().clamp(0.0, 65535.0) as u16;
        out.extend_from_slice(&q16_to_i16(q).to_le_bytes());
    }

    out.extend_from_slice(&sig.tag.0);

    let confidence_q16 = (sig.confidence.clamp(0.0, 1.0) * 65535.0).round() as u16;
    out.extend_from_slice(&confidence_q16.to_le_bytes());

    out
}

/// Decode a blob produced by [`encode`], rejecting anything whose magic,
/// version, or declared dimension is inconsistent.
pub fn decode(bytes: &[u8]) -> Result<Signature> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.take(4)?;
    if magic != MAGIC.as_slice() {
        return Err(Error::MalformedBlob("bad magic".into()));
    }

    let version = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap());
    if version != VERSION {
        return Err(Error::MalformedBlob(format!("unsupported version {version}")));
    }

    let sample_rate = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
    let n_fft = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
    let hop_length = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
    let segment_seconds = f32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
    let target_peak_count = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());

    let params = SignatureParams {
        sample_rate,
        n_fft,
        hop_length,
        segment_seconds,
        target_peak_count,
    };

    let peak_count = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    let mut peaks = Vec::with_capacity(peak_count);
    for _ in 0..peak_count {
        let frame = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
        let bin = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap());
        let magnitude_q16 = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap());
        peaks.push(PeakTriple {
            frame_index: frame,
            freq_bin: bin as u32,
            magnitude: magnitude_q16 as f32,
        });
    }

    let vector_dim = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    if vector_dim != target_peak_count as usize * 3 {
        return Err(Error::MalformedBlob(format!(
            "vector_dim {vector_dim} != target_peak_count*3 {}",
            target_peak_count * 3
        )));
    }
    let mut vector = Vec::with_capacity(vector_dim);
    for _ in 0..vector_dim {
        let raw = i16::from_le_bytes(cursor.take(2)?.try_into().unwrap());
        vector.push(i16_to_q16(raw) as f32);
    }

    let mut tag_bytes = [0u8; 16];
    tag_bytes.copy_from_slice(cursor.take(16)?);

    let confidence_q16 = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap());
    let confidence = confidence_q16 as f32 / 65535.0;

    let is_null = tag_bytes == IntegrityTag::NULL.0 && confidence == 0.0;

    Ok(Signature {
        peaks,
        vector,
        tag: IntegrityTag(tag_bytes),
        confidence,
        params,
        is_null,
    })
}

/// Minimal forward-only byte cursor so decode errors report as
/// [`Error::MalformedBlob`] rather than panicking on truncated input.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::MalformedBlob("truncated blob".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureParams;

    fn sample_signature() -> Signature {
        let params = SignatureParams {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            segment_seconds: 10.0,
            target_peak_count: 4,
        };
        let peaks = vec![
            PeakTriple { frame_index: 0, freq_bin: 10, magnitude: 1234.0 },
            PeakTriple { frame_index: 1, freq_bin: 20, magnitude: 5678.0 },
            PeakTriple { frame_index: 2, freq_bin: 30, magnitude: 9.0 },
            PeakTriple::SENTINEL,
        ];
        let vector: Vec<f32> = peaks
            .iter()
            .flat_map(|p| [p.frame_index as f32, p.freq_bin as f32, p.magnitude])
            .collect();
        let tag = crate::tag::compute_tag(b"irrelevant-for-this-test");
        Signature {
            peaks,
            vector,
            tag,
            confidence: 0.75,
            params,
            is_null: false,
        }
    }

    #[test]
    fn round_trips_bit_identically() {
        let sig = sample_signature();
        let encoded = encode(&sig);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded.params, sig.params);
        assert_eq!(decoded.peaks, sig.peaks);
        assert_eq!(decoded.vector, sig.vector);
        assert_eq!(decoded.tag, sig.tag);
        assert!((decoded.confidence - sig.confidence).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = encode(&sample_signature());
        encoded[0] = b'X';
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn rejects_truncated_blob() {
        let encoded = encode(&sample_signature());
        assert!(decode(&encoded[..encoded.len() - 10]).is_err());
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let mut encoded = encode(&sample_signature());
        // Corrupt vector_dim field (right after peak data) to a bogus value.
        let peak_count_offset = 4 + 2 + 20;
        let peak_count = u32::from_le_bytes(encoded[peak_count_offset..peak_count_offset + 4].try_into().unwrap());
        let vector_dim_offset = peak_count_offset + 4 + peak_count as usize * 8;
        encoded[vector_dim_offset..vector_dim_offset + 4].copy_from_slice(&999u32.to_le_bytes());
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn round_trips_through_a_file_on_disk() {
        use std::io::{Read, Write};

        let sig = sample_signature();
        let encoded = encode(&sig);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&encoded).unwrap();

        let mut read_back = Vec::new();
        std::fs::File::open(file.path()).unwrap().read_to_end(&mut read_back).unwrap();

        let decoded = decode(&read_back).unwrap();
        assert_eq!(decoded.params, sig.params);
        assert_eq!(decoded.vector, sig.vector);
    }
}
