//! Batch driver: waveform-level parallelism over a dedicated worker pool
//! with order-preserving output and cooperative cancellation (§4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::types::Segment;

/// A cheaply cloneable flag a caller can set to stop an in-flight batch
/// early. Workers check it between segments, not mid-FFT, so cancellation
/// is cooperative rather than preemptive.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, unset token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a per-segment extraction closure across a dedicated `rayon`
/// thread pool, sized from `cfg.worker_count` (`0` meaning "all cores").
///
/// Output order always matches input order: `rayon`'s `par_iter().collect()`
/// already reassembles results in index order regardless of completion
/// order, so no separate reordering buffer is needed. In-flight
/// concurrency is bounded by processing the input in chunks of
/// `queue_depth_factor * worker_count` items, rather than handing the
/// whole batch to the pool at once — the same backpressure a bounded
/// channel would give a streaming producer, without needing one.
pub struct BatchDriver {
    pool: rayon::ThreadPool,
    chunk_size: usize,
}

impl BatchDriver {
    /// Build a driver from the batch slice of the frozen config.
    pub fn new(cfg: &BatchConfig) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if cfg.worker_count > 0 {
            builder = builder.num_threads(cfg.worker_count);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build worker pool: {e}")))?;

        let effective_workers = if cfg.worker_count > 0 { cfg.worker_count } else { pool.current_num_threads() };
        let chunk_size = (cfg.queue_depth_factor * effective_workers.max(1)).max(1);

        info!(effective_workers, chunk_size, "batch driver initialised");
        Ok(Self { pool, chunk_size })
    }

    /// Run `extract` over every segment, in order, honoring `cancel`.
    ///
    /// Once cancellation is observed, remaining segments (including the
    /// rest of the in-flight chunk) resolve to [`Error::Cancelled`]
    /// rather than being silently dropped, so the output vector always
    /// has one entry per input segment.
    pub fn extract_all<T, F>(&self, segments: &[Segment], cancel: &CancellationToken, extract: F) -> Vec<Result<T>>
    where
        F: Fn(&Segment) -> Result<T> + Sync,
        T: Send,
    {
        self.pool.install(|| {
            segments
                .chunks(self.chunk_size)
                .flat_map(|chunk| {
                    if cancel.is_cancelled() {
                        debug!(chunk_len = chunk.len(), "batch cancelled before chunk dispatch");
                        return chunk.iter().map(|_| Err(Error::Cancelled)).collect::<Vec<_>>();
                    }
                    chunk
                        .par_iter()
                        .map(|segment| {
                            if cancel.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            extract(segment)
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }
}
