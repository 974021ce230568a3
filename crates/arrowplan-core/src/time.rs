//! Certainty-aware time arithmetic.
//!
//! Every time quantity in the network is a [`TimeTriple`]: a result value,
//! a variance estimate (used for PERT propagation) and an upper bound on
//! the accumulated computation error. When two competing estimates meet at
//! an event and differ by less than their combined error bounds, neither is
//! discarded: the estimates are mixed and both variances survive as an
//! upper bound.

use serde::{Deserialize, Serialize};

/// A time quantity with variance and computation-error tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTriple {
    /// Result of the time computation.
    pub res: f64,
    /// Variance estimate of the result.
    pub var: f64,
    /// Upper bound on the accumulated computation error.
    pub err: f64,
}

impl TimeTriple {
    pub const fn zero() -> Self {
        Self { res: 0.0, var: 0.0, err: 0.0 }
    }

    pub const fn new(res: f64, var: f64, err: f64) -> Self {
        Self { res, var, err }
    }

    /// A point estimate with no variance and no accumulated error.
    pub const fn point(res: f64) -> Self {
        Self { res, var: 0.0, err: 0.0 }
    }

    /// Mix two estimates that are indistinguishable within error.
    fn mix(a: Self, b: Self) -> Self {
        Self {
            res: 0.5 * (a.res + b.res),
            var: a.var.max(b.var),
            err: 0.5 * (a.err + b.err),
        }
    }

    /// Forward-pass choice: keep the later of two competing estimates,
    /// mixing them when they differ by less than the combined error.
    pub fn choice_early(old: Self, new: Self) -> Self {
        let band = old.err + new.err;
        let delta = new.res - old.res;
        if delta >= band {
            new
        } else if delta <= -band {
            old
        } else {
            Self::mix(old, new)
        }
    }

    /// Backward-pass choice: keep the earlier of two competing estimates,
    /// mixing them when they differ by less than the combined error.
    pub fn choice_late(old: Self, new: Self) -> Self {
        let band = old.err + new.err;
        let delta = old.res - new.res;
        if delta >= band {
            new
        } else if delta <= -band {
            old
        } else {
            Self::mix(old, new)
        }
    }

    /// Snap a reserve to zero when it is within its own error bound.
    pub fn round_to_zero(mut self) -> Self {
        if self.res.abs() <= self.err {
            self.res = 0.0;
        }
        self
    }
}

impl std::ops::Add for TimeTriple {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let res = self.res + rhs.res;
        Self {
            res,
            var: self.var + rhs.var,
            // Each addition contributes up to one epsilon of rounding slack.
            err: self.err + rhs.err + f64::EPSILON * res.abs(),
        }
    }
}

impl std::ops::Sub for TimeTriple {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let res = self.res - rhs.res;
        Self {
            res,
            var: self.var + rhs.var,
            err: self.err + rhs.err + f64::EPSILON * res.abs(),
        }
    }
}

impl std::ops::Neg for TimeTriple {
    type Output = Self;

    fn neg(self) -> Self {
        Self { res: -self.res, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addition_is_component_wise() {
        let a = TimeTriple::new(3.0, 1.0, 0.0);
        let b = TimeTriple::new(2.0, 0.5, 0.0);
        let sum = a + b;
        assert_eq!(sum.res, 5.0);
        assert_eq!(sum.var, 1.5);
        assert!(sum.err > 0.0 && sum.err < 1e-12);
    }

    #[test]
    fn subtraction_accumulates_variance() {
        let a = TimeTriple::new(10.0, 2.0, 0.0);
        let b = TimeTriple::new(4.0, 1.0, 0.0);
        let diff = a - b;
        assert_eq!(diff.res, 6.0);
        assert_eq!(diff.var, 3.0);
    }

    #[test]
    fn choice_early_takes_dominant_estimate() {
        let old = TimeTriple::new(5.0, 1.0, 0.1);
        let new = TimeTriple::new(8.0, 0.5, 0.1);
        assert_eq!(TimeTriple::choice_early(old, new), new);
        assert_eq!(TimeTriple::choice_early(new, old), new);
    }

    #[test]
    fn choice_early_mixes_within_error() {
        let old = TimeTriple::new(5.0, 1.0, 0.2);
        let new = TimeTriple::new(5.1, 2.0, 0.2);
        let mixed = TimeTriple::choice_early(old, new);
        assert!((mixed.res - 5.05).abs() < 1e-12);
        assert_eq!(mixed.var, 2.0);
        assert!((mixed.err - 0.2).abs() < 1e-12);
    }

    #[test]
    fn choice_late_takes_earlier_estimate() {
        let old = TimeTriple::new(8.0, 1.0, 0.1);
        let new = TimeTriple::new(5.0, 0.5, 0.1);
        assert_eq!(TimeTriple::choice_late(old, new), new);
        assert_eq!(TimeTriple::choice_late(new, old), new);
    }

    #[test]
    fn reserve_rounds_to_zero_within_error() {
        let r = TimeTriple::new(1e-14, 0.0, 1e-12).round_to_zero();
        assert_eq!(r.res, 0.0);
        let r = TimeTriple::new(0.5, 0.0, 1e-12).round_to_zero();
        assert_eq!(r.res, 0.5);
    }

    #[test]
    fn negation_flips_result_only() {
        let t = TimeTriple::new(4.0, 2.0, 0.5);
        let n = -t;
        assert_eq!(n.res, -4.0);
        assert_eq!(n.var, 2.0);
        assert_eq!(n.err, 0.5);
    }
}
