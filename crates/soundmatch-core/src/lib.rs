//! Audio fingerprinting and similarity matching core.
//!
//! This crate turns raw PCM into compact, comparable spectral-peak
//! fingerprints and provides the building blocks to find a short query
//! clip inside a large library of longer recordings:
//!
//! - [`segment`] slices PCM into fixed-length windows at a common sample rate.
//! - [`extract`] turns one window into a quantised [`types::Signature`]
//!   via STFT peak-picking.
//! - [`multires`] runs three independent resolutions of [`extract`] over
//!   the same window when finer-grained matching is worth the extra cost.
//! - [`compare`] fuses correlation and L2 distance into a single score
//!   and ranks candidates against a gating policy.
//! - [`index`] provides sublinear candidate retrieval over a large
//!   library via locality-sensitive hashing.
//! - [`batch`] parallelises extraction across a library's worth of
//!   segments with deterministic, order-preserving output.
//! - [`factory`] is the single entry point that validates a config and
//!   wires the above into a consistent [`factory::Fingerprinter`].
//!
//! Everything here is synchronous and allocation-light; I/O (reading
//! video files, decoding audio, persisting the library) is the
//! embedder's responsibility, not this crate's.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod batch;
pub mod codec;
pub mod compare;
pub mod config;
pub mod error;
pub mod extract;
pub mod factory;
pub mod index;
#[cfg(feature = "multi-resolution")]
pub mod multires;
pub mod segment;
pub mod tag;
pub mod types;

pub use config::FingerprintConfig;
pub use error::{Error, Result};
pub use factory::{AnyExtractor, Fingerprinter, FingerprinterFactory};
pub use types::{MatchResult, PcmBuffer, Segment, Signature};
