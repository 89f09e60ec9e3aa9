//! Seeded per-group permutations.
//!
//! Every sampler owns its own ChaCha8 stream, so two samplers built from the
//! same `(n, seed)` yield the same sequence of permutations regardless of what
//! any other sampler does in between.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Derives a group's sampler seed from the loader's master seed.
///
/// The result depends only on `master_seed` and `label`, not on the order in
/// which groups are enumerated.
pub fn derive_group_seed(master_seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Restartable random permutation generator over `0..n`.
///
/// Each call to [`GroupSampler::next_pass`] reshuffles, so consecutive passes
/// see different orders while the whole sequence of passes stays reproducible.
#[derive(Debug, Clone)]
pub struct GroupSampler {
    len: usize,
    seed: u64,
    rng: ChaCha8Rng,
}

impl GroupSampler {
    pub fn new(len: usize, seed: u64) -> Self {
        Self {
            len,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Number of indices permuted per pass.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Produces the permutation for the next pass.
    pub fn next_pass(&mut self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        indices.shuffle(&mut self.rng);
        indices
    }

    /// Rewinds the stream to its first pass.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}
