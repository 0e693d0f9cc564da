//! Seedable random number generator for deterministic testing.
//!
//! When a seed is provided via [`crate::Config`], all non-cryptographic
//! randomness (hello randoms, session ids, backoff jitter) is
//! deterministic. Ephemeral EC keys always come from the OS.

use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A random number generator that can be seeded for deterministic behavior.
pub struct SeededRng {
    inner: Option<StdRng>,
}

impl SeededRng {
    /// Create a new RNG with an optional seed.
    ///
    /// If `seed` is `Some`, the RNG produces deterministic values.
    /// If `seed` is `None`, it uses the thread-local random generator.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner }
    }

    /// Generate a random value of type T.
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        match self.inner.as_mut() {
            Some(rng) => rng.gen(),
            None => rand::random(),
        }
    }

    /// Fill a byte slice with random data.
    pub fn fill(&mut self, out: &mut [u8]) {
        for b in out {
            *b = self.random();
        }
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRng")
            .field("seeded", &self.inner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut rng1 = SeededRng::new(Some(12345));
        let mut rng2 = SeededRng::new(Some(12345));

        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        rng1.fill(&mut a);
        rng2.fill(&mut b);

        assert_eq!(a, b, "Same seed should produce same values");
    }

    #[test]
    fn different_seeds_produce_different_values() {
        let mut rng1 = SeededRng::new(Some(12345));
        let mut rng2 = SeededRng::new(Some(54321));

        let value1: u64 = rng1.random();
        let value2: u64 = rng2.random();

        assert_ne!(value1, value2);
    }
}
