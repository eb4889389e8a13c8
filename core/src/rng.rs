//! Deterministic random number generation for synthetic workloads.
//!
//! RULE: The synthetic generator never calls a platform RNG.
//! Every draw flows through a SeededRng derived from one master seed.
//!
//! Each record kind draws from its own stream, seeded from
//! (master_seed XOR slot · golden-ratio constant), so adding a stream
//! never shifts the draws of existing ones.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeededRng {
    pub stream: &'static str,
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(master_seed: u64, slot: StreamSlot) -> Self {
        let derived_seed = master_seed ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            stream: slot.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Uniform in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in [0, n). Returns 0 when n is 0.
    pub fn below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Uniform in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto draw; heavier tail for smaller alpha.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let idx = self.below(items.len() as u64) as usize;
        items.get(idx)
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries, only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Experiments = 0,
    Campaigns = 1,
    Retention = 2,
    Measurements = 3,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
            Self::Campaigns => "campaigns",
            Self::Retention => "retention",
            Self::Measurements => "measurements",
        }
    }
}
