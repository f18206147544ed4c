//! Seeded Mersenne Twister PRNG shared by all transport engines.
//!
//! A single [`Prng`] belongs to one [`crate::Context`]; every uniform draw made by the neutrino,
//! lepton and decay engines is routed back through it via the adapters in [`crate::binding`], so
//! that stream ordering is determined solely by the driver.

use rand_core::RngCore;
use rand_mt::Mt19937GenRand32;

/// A seeded MT19937 generator producing uniform draws on `[0, 1)`.
pub struct Prng {
    state: Mt19937GenRand32,
}

impl Prng {
    /// Seeds the generator from the operating system's cryptographic source.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS entropy source is unavailable.
    pub fn from_os_entropy() -> crate::Result<Self> {
        let mut seed = [0u8; 4];
        getrandom::getrandom(&mut seed)
            .map_err(|err| crate::Error::General(format!("could not seed the PRNG: {err}")))?;
        Ok(Self::from_seed(u32::from_le_bytes(seed)))
    }

    /// Seeds the generator from an explicit 32-bit seed. Used by tests and by any reproducible
    /// run.
    #[must_use]
    pub fn from_seed(seed: u32) -> Self {
        Self { state: Mt19937GenRand32::new(seed) }
    }

    /// Draws a uniform sample on `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        let y = self.state.next_u32();
        f64::from(y) / f64::from(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_are_within_unit_interval() {
        let mut prng = Prng::from_seed(1234);
        for _ in 0..10_000 {
            let u = prng.uniform01();
            assert!((0.0..=1.0).contains(&u));
        }
    }

    #[test]
    fn same_seed_reproduces_same_stream() {
        let mut a = Prng::from_seed(42);
        let mut b = Prng::from_seed(42);
        for _ in 0..100 {
            assert_eq!(a.uniform01(), b.uniform01());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Prng::from_seed(1);
        let mut b = Prng::from_seed(2);
        let draws_a: Vec<_> = (0..10).map(|_| a.uniform01()).collect();
        let draws_b: Vec<_> = (0..10).map(|_| b.uniform01()).collect();
        assert_ne!(draws_a, draws_b);
    }
}
