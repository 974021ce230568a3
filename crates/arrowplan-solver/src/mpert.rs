//! Modified-PERT distribution fitting and queries.
//!
//! The scheduler propagates means and variances; quantile and CDF queries
//! fit a modified-PERT (BetaPERT) distribution to the propagated
//! `(mean, variance)` inside the `[a, b]` interval and answer through the
//! underlying Beta distribution. A collapsed interval or a variance below
//! the interval-scaled threshold is the deterministic regime: queries fall
//! back to the point estimate, which is not an error.

use statrs::distribution::{Beta, ContinuousCDF};

use arrowplan_core::TimeTriple;

/// Result of fitting the distribution to `(mean, variance, a, b)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MpertFit {
    /// Deterministic regime; carry the point estimate.
    Deterministic(f64),
    /// A usable `(mode, gamma)` pair.
    Fitted { mode: f64, gamma: f64 },
}

/// Solve `mean = (a + γ·m + b)/(2+γ)` and
/// `var = (mean−a)(b−mean)/(3+γ)` for `(m, γ)`.
pub fn fit_mpert(mean: f64, var: f64, a: f64, b: f64) -> MpertFit {
    let span = b - a;
    if !span.is_finite() || span <= 0.0 {
        return MpertFit::Deterministic(mean);
    }
    let sd = var.max(0.0).sqrt();
    let sqrt_eps = f64::EPSILON.sqrt();
    if sd <= span * sqrt_eps {
        return MpertFit::Deterministic(mean);
    }

    let tau = span * sqrt_eps;
    let m = mean.clamp(a + tau, b - tau);

    let mut gamma = (m - a) * (b - m) / var - 3.0;
    // Lower bound that keeps the mode strictly inside (a, b).
    let g_lo = (a + b - 2.0 * m) / (m - a);
    let g_hi = (2.0 * m - a - b) / (b - m);
    let gamma_min = g_lo.max(g_hi).max(sqrt_eps);
    if gamma < gamma_min {
        gamma = gamma_min;
    }

    let mode = ((2.0 + gamma) * m - a - b) / gamma;
    MpertFit::Fitted { mode: mode.clamp(a + tau, b - tau), gamma }
}

/// Quantile of the propagated estimate `t` inside `[a, b]`.
///
/// Deterministic fits and NaN results degrade to the point estimate.
pub fn quantile(p: f64, t: TimeTriple, a: f64, b: f64) -> f64 {
    match fit_mpert(t.res, t.var, a, b) {
        MpertFit::Deterministic(v) => v,
        MpertFit::Fitted { mode, gamma } => {
            let q = mpert_ppf(p, a, mode, b, gamma);
            if q.is_nan() {
                t.res
            } else {
                q
            }
        }
    }
}

/// CDF of the propagated estimate `t` at `value`.
///
/// In the deterministic regime the distribution is a step at the point
/// estimate.
pub fn prob(value: f64, t: TimeTriple, a: f64, b: f64) -> f64 {
    match fit_mpert(t.res, t.var, a, b) {
        MpertFit::Deterministic(v) => {
            if value >= v {
                1.0
            } else {
                0.0
            }
        }
        MpertFit::Fitted { mode, gamma } => {
            let c = mpert_cdf(value, a, mode, b, gamma);
            if c.is_nan() {
                if value >= t.res {
                    1.0
                } else {
                    0.0
                }
            } else {
                c
            }
        }
    }
}

fn beta_shape(a: f64, m: f64, b: f64, gamma: f64) -> Option<Beta> {
    let span = b - a;
    let alpha = 1.0 + gamma * (m - a) / span;
    let beta = 1.0 + gamma * (b - m) / span;
    if !alpha.is_finite() || !beta.is_finite() {
        return None;
    }
    Beta::new(alpha, beta).ok()
}

/// `ppf(p, a, m, b, γ)` of the modified-PERT distribution.
pub fn mpert_ppf(p: f64, a: f64, m: f64, b: f64, gamma: f64) -> f64 {
    let Some(dist) = beta_shape(a, m, b, gamma) else {
        return f64::NAN;
    };
    a + (b - a) * dist.inverse_cdf(p.clamp(0.0, 1.0))
}

/// `cdf(x, a, m, b, γ)` of the modified-PERT distribution.
pub fn mpert_cdf(x: f64, a: f64, m: f64, b: f64, gamma: f64) -> f64 {
    if x <= a {
        return 0.0;
    }
    if x >= b {
        return 1.0;
    }
    let Some(dist) = beta_shape(a, m, b, gamma) else {
        return f64::NAN;
    };
    dist.cdf((x - a) / (b - a))
}
