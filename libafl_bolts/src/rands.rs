//! Fast, non-cryptographic random number generators for the scheduler
//! and other core decision points that don't need anything stronger.

use serde::{Deserialize, Serialize};

/// A source of randomness usable by the fuzzer core.
pub trait Rand {
    /// The next random `u64`.
    fn next(&mut self) -> u64;

    /// Seeds the generator.
    fn set_seed(&mut self, seed: u64);

    /// A random value in `[0, upper_bound)`. Returns `0` if `upper_bound == 0`.
    fn below(&mut self, upper_bound: usize) -> usize {
        if upper_bound == 0 {
            return 0;
        }
        (self.next() % upper_bound as u64) as usize
    }
}

/// `RomuDuoJr`, the generator `libafl_bolts` defaults to: two `u64` words of
/// state, one multiply-rotate-xor step per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdRand {
    x_state: u64,
    y_state: u64,
}

impl StdRand {
    /// Creates a new generator seeded from the given value.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        let mut rand = Self {
            x_state: 0,
            y_state: 0,
        };
        rand.set_seed(seed);
        rand
    }
}

impl Default for StdRand {
    fn default() -> Self {
        Self::with_seed(0x1234_5678_9abc_def0)
    }
}

impl Rand for StdRand {
    fn next(&mut self) -> u64 {
        let x_state = self.x_state;
        self.x_state = 15241094284759029579_u64.wrapping_mul(self.y_state);
        self.y_state = self.y_state.wrapping_sub(x_state);
        self.y_state = self.y_state.rotate_left(27);
        x_state
    }

    fn set_seed(&mut self, seed: u64) {
        self.x_state = seed ^ 0x0123_4567_89ab_cdef;
        self.y_state = seed ^ 0xfedc_ba98_7654_3210;
        // Burn a few rounds so nearby seeds diverge quickly.
        for _ in 0..4 {
            let _ = self.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_is_bounded() {
        let mut rand = StdRand::with_seed(1);
        for _ in 0..1000 {
            assert!(rand.below(7) < 7);
        }
    }

    #[test]
    fn below_zero_is_zero() {
        let mut rand = StdRand::with_seed(1);
        assert_eq!(rand.below(0), 0);
    }

    #[test]
    fn distinct_seeds_diverge() {
        let mut a = StdRand::with_seed(1);
        let mut b = StdRand::with_seed(2);
        assert_ne!(a.next(), b.next());
    }
}
