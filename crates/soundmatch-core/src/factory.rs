//! Factory: the single point where a [`FingerprintConfig`] is validated
//! and turned into a consistent set of pipeline components (§4.7).

use tracing::info;

use crate::batch::BatchDriver;
use crate::compare::Comparator;
use crate::config::FingerprintConfig;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::index::LshIndex;
#[cfg(feature = "multi-resolution")]
use crate::multires::MultiResExtractor;
use crate::segment::Segmenter;

/// Either a single-resolution or multi-resolution extractor, chosen once
/// at construction time from `cfg.use_multi_resolution`.
pub enum AnyExtractor {
    /// One fixed STFT resolution.
    Single(Extractor),
    /// Three fixed STFT resolutions fused at compare time.
    #[cfg(feature = "multi-resolution")]
    MultiRes(MultiResExtractor),
}

/// A fully wired set of pipeline components, built from one validated
/// config. Every component here was constructed from the same frozen
/// `cfg`, so their params are guaranteed consistent with each other.
pub struct Fingerprinter {
    /// Slices incoming PCM into fixed-length windows.
    pub segmenter: Segmenter,
    /// Turns windows into signatures, at one or three resolutions.
    pub extractor: AnyExtractor,
    /// Scores and ranks signatures against each other.
    pub comparator: Comparator,
    /// Parallelises extraction across a library's segments.
    pub batch_driver: BatchDriver,
    /// Sublinear candidate retrieval over the indexed resolution.
    pub lsh_index: LshIndex,
}

/// Validates a [`FingerprintConfig`] exactly once and constructs the
/// components that implement it.
pub struct FingerprinterFactory;

impl FingerprinterFactory {
    /// Build a [`Fingerprinter`] from `cfg`, rejecting it if invalid or
    /// internally inconsistent.
    ///
    /// No component constructed here re-validates `cfg`; this is the
    /// only place [`FingerprintConfig::validate`] is called.
    pub fn build(cfg: &FingerprintConfig) -> Result<Fingerprinter> {
        cfg.validate()?;

        let segmenter = Segmenter::new(cfg);
        let comparator = Comparator::new(cfg.comparator);
        let batch_driver = BatchDriver::new(&cfg.batch)?;

        #[cfg(feature = "multi-resolution")]
        let extractor = if cfg.use_multi_resolution {
            AnyExtractor::MultiRes(MultiResExtractor::new(cfg))
        } else {
            AnyExtractor::Single(Extractor::new(cfg))
        };
        #[cfg(not(feature = "multi-resolution"))]
        let extractor = {
            if cfg.use_multi_resolution {
                return Err(Error::InvalidConfig(
                    "use_multi_resolution requires the multi-resolution feature".into(),
                ));
            }
            AnyExtractor::Single(Extractor::new(cfg))
        };

        let lsh_index = LshIndex::new(&cfg.lsh, cfg.vector_dim());

        info!(
            use_multi_resolution = cfg.use_multi_resolution,
            indexed_resolution = ?cfg.indexed_resolution,
            "fingerprinter constructed"
        );

        Ok(Fingerprinter { segmenter, extractor, comparator, batch_driver, lsh_index })
    }
}
