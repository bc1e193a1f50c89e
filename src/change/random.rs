//! Permutation draws for the change-detection null distribution
//!
//! Each draw is addressed by its index and owns a private RNG seeded from
//! `(seed, draw)`, so draws can be evaluated in any order or on any thread
//! and still reproduce the same permutations.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Source of random permutations of pooled day indices
pub trait PermutationSource: Send + Sync {
    /// Permutation of `0..n` for draw number `draw`
    fn permutation(&self, draw: usize, n: usize) -> Vec<usize>;
}

/// Derive a per-draw seed from a base seed and a draw counter (SplitMix64)
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Uniform Fisher-Yates permutations from a base seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededPermutations {
    seed: u64,
}

impl SeededPermutations {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Fresh base seed from the thread RNG
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl PermutationSource for SeededPermutations {
    fn permutation(&self, draw: usize, n: usize) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(counter_rng_seed(self.seed, draw as u64));
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        indices
    }
}

impl<S: PermutationSource + ?Sized> PermutationSource for &S {
    fn permutation(&self, draw: usize, n: usize) -> Vec<usize> {
        (**self).permutation(draw, n)
    }
}
