//! Genotype likelihoods for a diploid individual under a symmetric per-read error rate,
//! and the Hardy-Weinberg genotype prior.
//!
//! With `r` reference reads out of `N` and error rate `e`:
//!
//! * `g = 0`: every reference read is an error, `C(N,r) e^r (1-e)^(N-r)`
//! * `g = 1`: each read is reference with probability 1/2, `C(N,r) 2^-N`
//! * `g = 2`: every alternative read is an error, `C(N,r) (1-e)^r e^(N-r)`
//!
//! Values are computed in log space and exponentiated at the end.

use crate::error::Result;
use crate::model::{Dataset, Genotype, Observation, check_counts, check_error_rate, check_frequency};
use statrs::function::factorial::ln_binomial;
use std::f64::consts::LN_2;

// Taken at the smaller of r and N - r so that swapping allele roles gives identical bits.
fn ln_choose(n: u64, r: u64) -> f64 {
    ln_binomial(n, r.min(n - r))
}

pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

impl Genotype {
    /// `ln P(r | N, g, e)` given `ln_c = ln C(N, r)`. Counts and error rate must already be validated.
    fn log_likelihood_with(self, ln_c: f64, r: u64, n: u64, e: f64) -> f64 {
        match self {
            Genotype::Het => ln_c - n as f64 * LN_2,
            Genotype::HomAlt | Genotype::HomRef => {
                let (errors, correct) = if self == Genotype::HomAlt {
                    (r, n - r)
                } else {
                    (n - r, r)
                };
                ln_c + errors as f64 * e.ln() + correct as f64 * (1.0 - e).ln()
            }
        }
    }

    pub(crate) fn log_likelihood(self, r: u64, n: u64, e: f64) -> f64 {
        self.log_likelihood_with(ln_choose(n, r), r, n, e)
    }

    /// Hardy-Weinberg frequency of this genotype, `C(2,g) psi^g (1-psi)^(2-g)`.
    pub(crate) fn prior(self, psi: f64) -> f64 {
        let g = self.ref_copies() as i32;
        let c = if self == Genotype::Het { 2.0 } else { 1.0 };
        c * psi.powi(g) * (1.0 - psi).powi(2 - g)
    }
}

/// Joint log weights `ln(P(r|g) P(g|psi))` indexed by genotype. Inputs must be validated.
pub(crate) fn log_weights(obs: &Observation, e: f64, psi: f64) -> [f64; 3] {
    let (r, n) = (obs.ref_reads(), obs.depth());
    let ln_c = ln_choose(n, r);
    Genotype::ALL.map(|g| g.log_likelihood_with(ln_c, r, n, e) + g.prior(psi).ln())
}

pub(crate) fn normalize_log_weights(log_w: &[f64; 3]) -> (f64, [f64; 3]) {
    let total = log_sum_exp(log_w);
    (total, log_w.map(|w| (w - total).exp()))
}

/// `ln P(r | N, g, e)`.
pub fn log_likelihood(r: u64, n: u64, g: u8, e: f64) -> Result<f64> {
    let genotype = Genotype::try_from(g)?;
    check_counts(r, n)?;
    check_error_rate(e)?;
    Ok(genotype.log_likelihood(r, n, e))
}

/// Probability of observing exactly `r` reference reads out of `n` given genotype `g`
/// and per-read error rate `e`.
pub fn likelihood(r: u64, n: u64, g: u8, e: f64) -> Result<f64> {
    Ok(log_likelihood(r, n, g, e)?.exp())
}

/// Hardy-Weinberg prior of genotype `g` at reference-allele frequency `psi`.
pub fn prior(g: u8, psi: f64) -> Result<f64> {
    let genotype = Genotype::try_from(g)?;
    check_frequency(psi)?;
    Ok(genotype.prior(psi))
}

/// `likelihood(r, n, g, e) * prior(g, psi)`.
pub fn weight(r: u64, n: u64, g: u8, e: f64, psi: f64) -> Result<f64> {
    Ok(likelihood(r, n, g, e)? * prior(g, psi)?)
}

/// Posterior genotype probabilities `P(g | r, N, e, psi)`, indexed by reference copies.
pub fn posterior(obs: &Observation, e: f64, psi: f64) -> Result<[f64; 3]> {
    check_error_rate(e)?;
    check_frequency(psi)?;
    Ok(normalize_log_weights(&log_weights(obs, e, psi)).1)
}

/// `ln P((r, N) | psi)`, marginalised over the three genotypes.
pub fn marginal_log_likelihood(obs: &Observation, e: f64, psi: f64) -> Result<f64> {
    check_error_rate(e)?;
    check_frequency(psi)?;
    Ok(log_sum_exp(&log_weights(obs, e, psi)))
}

impl Dataset {
    /// Log-likelihood of all observations at frequency `psi`, treating individuals as independent.
    pub fn log_likelihood(&self, e: f64, psi: f64) -> Result<f64> {
        self.ensure_not_empty()?;
        check_error_rate(e)?;
        check_frequency(psi)?;
        Ok(self
            .observations()
            .iter()
            .map(|obs| log_sum_exp(&log_weights(obs, e, psi)))
            .sum())
    }
}
