//! Random source used by the network engine.
//!
//! Every stochastic call takes its generator explicitly, so a run is fully
//! reproducible from its seed and concurrent runs never share state.

use rand::{Rng, SeedableRng, seq::index};
use rand_chacha::ChaCha12Rng;

pub trait RandomSource {
    /// Draw a uniform value in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Draw `k` distinct indices from `0..n`, uniformly without replacement.
    ///
    /// Callers must ensure `k <= n`.
    fn sample(&mut self, n: usize, k: usize) -> Vec<usize>;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn sample(&mut self, n: usize, k: usize) -> Vec<usize> {
        index::sample(self, n, k).into_vec()
    }
}

/// Generator used by the driver, seeded deterministically.
pub fn seeded_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}
