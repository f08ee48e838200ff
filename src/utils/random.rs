//! Injectable randomness for the rate limiter's sorted-set member suffix.
//!
//! Only uniqueness-within-millisecond is required (§4.7), not cryptographic
//! unpredictability, so a seedable generator is enough.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub trait SuffixGen: Send + Sync {
    /// Returns a short opaque suffix to disambiguate sorted-set members that
    /// share a millisecond timestamp.
    fn suffix(&self) -> String;
}

pub struct ThreadRngSuffix;

impl SuffixGen for ThreadRngSuffix {
    fn suffix(&self) -> String {
        let n: u32 = rand::thread_rng().gen();
        format!("{n:08x}")
    }
}

/// Deterministic generator for reproducible tests.
pub struct SeededSuffix(Mutex<StdRng>);

impl SeededSuffix {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl SuffixGen for SeededSuffix {
    fn suffix(&self) -> String {
        let n: u32 = self.0.lock().expect("suffix rng lock").gen();
        format!("{n:08x}")
    }
}
