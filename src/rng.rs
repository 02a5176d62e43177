//! Deterministic decision source for the workload generators.
//!
//! A 32-bit xorshift generator. It is tiny, has no hidden state beyond one
//! word, and produces the same stream on every platform and every `rand`
//! release, so `(seed, iterations, min_size, max_size)` pins down the exact
//! sequence of sizes and slots a workload will request.

use rand::{Error, Rng, RngCore, SeedableRng};

/// State substituted for a zero seed (xorshift never leaves the all-zero state).
const ZERO_SEED_REPLACEMENT: u32 = 0x9E37_79B9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed };
        Self { state }
    }

    #[inline]
    fn step(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

impl RngCore for XorShift32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let hi = self.step() as u64;
        let lo = self.step() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.step().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state as u32 ^ (state >> 32) as u32)
    }
}

/// A request size in `[min_size, max_size]`.
#[inline]
pub fn random_size<R: Rng>(rng: &mut R, min_size: usize, max_size: usize) -> usize {
    rng.gen_range(min_size..=max_size)
}

/// A slot index in `[0, slots)`. `slots` must be non-zero.
#[inline]
pub fn random_slot<R: Rng>(rng: &mut R, slots: usize) -> usize {
    rng.gen_range(0..slots)
}
