use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// The single randomness source every stochastic decision goes through.
///
/// Only [`Dice::unit`] is required; the helpers are defined on top of it so
/// a scripted implementation controls every outcome by queueing unit rolls.
pub trait Dice: Send + Sync {
    /// Uniform in `[0, 1)`.
    fn unit(&self) -> f64;

    /// `d(n)`: uniform integer in `[0, n-1]`. Returns 0 without rolling when `n <= 0`.
    fn below(&self, n: i64) -> i64 {
        if n <= 0 {
            return 0;
        }
        let v = (self.unit() * n as f64).floor() as i64;
        v.clamp(0, n - 1)
    }

    /// True with probability `percent / 100`.
    fn chance(&self, percent: f64) -> bool {
        self.unit() < percent / 100.0
    }

    /// Uniform integer in `[lo, hi]`. Returns `lo` without rolling when `hi <= lo`.
    fn range(&self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        lo + self.below(hi - lo + 1)
    }

    /// Uniform in `[lo, hi)`.
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        lo + self.unit() * (hi - lo)
    }
}

/// Process-wide dice over a small fast PRNG.
pub struct SeededDice {
    rng: Mutex<SmallRng>,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_os_rng()),
        }
    }
}

impl Dice for SeededDice {
    fn unit(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .random::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_rolls() {
        let a = SeededDice::new(7);
        let b = SeededDice::new(7);
        for _ in 0..32 {
            assert_eq!(a.unit(), b.unit());
        }
    }

    #[test]
    fn below_stays_in_range() {
        let dice = SeededDice::new(42);
        for n in 1..20 {
            for _ in 0..200 {
                let v = dice.below(n);
                assert!((0..n).contains(&v), "d({n}) gave {v}");
            }
        }
        assert_eq!(dice.below(0), 0);
        assert_eq!(dice.below(-3), 0);
    }

    #[test]
    fn range_is_inclusive() {
        let dice = SeededDice::new(3);
        let mut seen_lo = false;
        let mut seen_hi = false;
        for _ in 0..2000 {
            let v = dice.range(2, 4);
            assert!((2..=4).contains(&v));
            seen_lo |= v == 2;
            seen_hi |= v == 4;
        }
        assert!(seen_lo && seen_hi);
        assert_eq!(dice.range(5, 5), 5);
    }

    #[test]
    fn uniform_respects_bounds() {
        let dice = SeededDice::new(11);
        for _ in 0..1000 {
            let v = dice.uniform(-0.05, 0.05);
            assert!((-0.05..0.05).contains(&v));
        }
    }
}
