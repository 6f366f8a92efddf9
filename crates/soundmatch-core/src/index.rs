//! LSH index: random-hyperplane candidate retrieval over quantised
//! vectors (§4.5).

use std::collections::HashMap;
use std::sync::RwLock;

use rand::distributions::Distribution;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

use crate::config::LshConfig;
use crate::error::{Error, Result};

/// Opaque identifier stored alongside each indexed vector.
pub type Identifier = Vec<u8>;

/// One independent hash table: `hash_bits` random hyperplanes and the
/// buckets they produce.
struct Table {
    /// `hash_bits` hyperplane normals, each of length `dim`, row-major.
    planes: Vec<f32>,
    buckets: RwLock<HashMap<u64, Vec<usize>>>,
}

impl Table {
    fn new(dim: usize, hash_bits: u32, rng: &mut StdRng) -> Self {
        let planes = (0..hash_bits as usize * dim)
            .map(|_| StandardNormal.sample(rng))
            .collect();
        Self { planes, buckets: RwLock::new(HashMap::new()) }
    }

    fn hash(&self, vector: &[f32], hash_bits: u32, dim: usize) -> u64 {
        let mut key: u64 = 0;
        for bit in 0..hash_bits as usize {
            let row = &self.planes[bit * dim..(bit + 1) * dim];
            let dot: f32 = row.iter().zip(vector.iter()).map(|(&p, &v)| p * v).sum();
            if dot >= 0.0 {
                key |= 1u64 << bit;
            }
        }
        key
    }

    fn insert(&self, key: u64, row: usize) {
        self.buckets.write().unwrap().entry(key).or_default().push(row);
    }

    fn get(&self, key: u64) -> Vec<usize> {
        self.buckets.read().unwrap().get(&key).cloned().unwrap_or_default()
    }
}

/// Random-hyperplane LSH index over fixed-dimension quantised vectors.
///
/// `T` independent tables each bucket rows by an `H`-bit packed key
/// (sign of a dot product against a seeded random hyperplane). A query
/// retrieves its bucket from every table and ranks the union by
/// table-hit count, breaking ties by insertion order, then truncates to
/// `cap`.
pub struct LshIndex {
    tables: Vec<Table>,
    dim: usize,
    hash_bits: u32,
    cap: usize,
    identifiers: RwLock<Vec<Identifier>>,
    vectors: RwLock<Vec<Vec<f32>>>,
}

impl LshIndex {
    /// Build an empty index for vectors of dimension `dim`.
    pub fn new(cfg: &LshConfig, dim: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let tables = (0..cfg.tables).map(|_| Table::new(dim, cfg.hash_bits, &mut rng)).collect();
        Self {
            tables,
            dim,
            hash_bits: cfg.hash_bits,
            cap: cfg.cap,
            identifiers: RwLock::new(Vec::new()),
            vectors: RwLock::new(Vec::new()),
        }
    }

    /// Insert a vector under `identifier`. The vector's dimension must
    /// match the index's configured `dim`.
    pub fn insert(&self, identifier: Identifier, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }

        let row = {
            let mut identifiers = self.identifiers.write().unwrap();
            let mut vectors = self.vectors.write().unwrap();
            identifiers.push(identifier);
            vectors.push(vector.clone());
            identifiers.len() - 1
        };

        for table in &self.tables {
            let key = table.hash(&vector, self.hash_bits, self.dim);
            table.insert(key, row);
        }

        Ok(())
    }

    /// Number of vectors stored in the index.
    pub fn len(&self) -> usize {
        self.identifiers.read().unwrap().len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve a candidate set for `query` using the configured default
    /// cap (§6 op 6's common case).
    pub fn candidates(&self, query: &[f32]) -> Result<Vec<Identifier>> {
        self.candidates_capped(query, self.cap)
    }

    /// Retrieve a candidate set for `query`, ranked by the number of
    /// tables whose bucket it shares with the query (descending),
    /// breaking ties by insertion order, truncated to `cap`.
    ///
    /// Pass `usize::MAX` for an effectively unbounded cap, matching §8's
    /// index-closure property (`candidates(v, ∞)`): every bucket hit is
    /// returned, not just the configured default slice.
    pub fn candidates_capped(&self, query: &[f32], cap: usize) -> Result<Vec<Identifier>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }

        let mut hit_counts: HashMap<usize, usize> = HashMap::new();
        for table in &self.tables {
            let key = table.hash(query, self.hash_bits, self.dim);
            for row in table.get(key) {
                *hit_counts.entry(row).or_insert(0) += 1;
            }
        }

        let mut rows: Vec<(usize, usize)> = hit_counts.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(cap);

        debug!(candidate_count = rows.len(), cap, "lsh candidate retrieval");

        let identifiers = self.identifiers.read().unwrap();
        Ok(rows.into_iter().map(|(row, _)| identifiers[row].clone()).collect())
    }
}
