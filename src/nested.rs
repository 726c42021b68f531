//! A nested sampler (Skilling, 2006) estimating the log-evidence of a model.
//!
//! Live points live in the unit cube and are mapped into parameter space by a
//! prior transform. Each iteration replaces the worst live point with a new
//! one drawn from the prior subject to a rising likelihood threshold, while
//! the prior volume shrinks geometrically by `exp(-1 / n_live)`.

use crate::ensemble::finite_or_neg_inf;
use crate::error::{Error, Result};
use crate::stats::logaddexp;
use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Accepted random-walk steps collected before a replacement point counts as
/// decorrelated from its start.
const TARGET_ACCEPTS: usize = 25;

/// Proposal budget per replacement before the walk is declared stuck.
const MAX_PROPOSALS: usize = 2000;

/// The outcome of a nested-sampling run.
#[derive(Debug, Clone, Copy)]
pub struct NestedResult {
    /// Estimated log-evidence.
    pub log_evidence: f64,
    /// Statistical uncertainty on the log-evidence, `sqrt(H / n_live)`.
    pub log_evidence_err: f64,
    /// Information (H) in nats.
    pub information: f64,
    /// Number of replacement iterations performed.
    pub n_iter: usize,
    /// Whether the remaining-evidence tolerance was reached (`false` when the
    /// run stopped at its iteration cap instead).
    pub converged: bool,
}

/// A nested sampler over a log-likelihood surface and a unit-cube prior
/// transform.
pub struct NestedSampler<L, P>
where
    L: Fn(&[f64]) -> f64 + Sync,
    P: Fn(&[f64]) -> Vec<f64> + Sync,
{
    log_likelihood: L,
    prior_transform: P,
    dim: usize,
    n_live: usize,
    rng: SmallRng,
}

impl<L, P> NestedSampler<L, P>
where
    L: Fn(&[f64]) -> f64 + Sync,
    P: Fn(&[f64]) -> Vec<f64> + Sync,
{
    /// Creates a sampler with `n_live` live points over a `dim`-dimensional
    /// unit cube.
    pub fn new(log_likelihood: L, prior_transform: P, dim: usize, n_live: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Validation(
                "Expected at least one dimension.".to_string(),
            ));
        }
        if n_live < 2 {
            return Err(Error::Validation(format!(
                "Expected at least 2 live points, got {n_live}."
            )));
        }
        Ok(Self {
            log_likelihood,
            prior_transform,
            dim,
            n_live,
            rng: SmallRng::seed_from_u64(thread_rng().gen::<u64>()),
        })
    }

    /// Sets the random seed (builder style), making runs reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Runs until the estimated remaining log-evidence drops below `tol`, or
    /// until `maxiter` iterations when a cap is given.
    pub fn run(&mut self, tol: f64, maxiter: Option<usize>) -> Result<NestedResult> {
        self.run_inner(tol, maxiter, None)
    }

    /// Same as [`NestedSampler::run`] but renders a progress spinner with the
    /// current remaining-evidence estimate.
    pub fn run_with_progress(&mut self, tol: f64, maxiter: Option<usize>) -> Result<NestedResult> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {spinner} iteration {pos} {msg}")
                .unwrap(),
        );
        let out = self.run_inner(tol, maxiter, Some(&pb));
        pb.finish_with_message("Done!");
        out
    }

    fn run_inner(
        &mut self,
        tol: f64,
        maxiter: Option<usize>,
        pb: Option<&ProgressBar>,
    ) -> Result<NestedResult> {
        let (mut units, mut log_ls) = self.initial_population()?;

        let shrink = 1.0 / self.n_live as f64;
        // ln(X_{i-1} - X_i) = ln X_{i-1} + ln(1 - exp(-1/n_live))
        let log_shell = (1.0 - (-shrink).exp()).ln();

        let mut log_z = f64::NEG_INFINITY;
        let mut h = 0.0;
        let mut log_vol = 0.0;
        let mut scale = 0.1;
        let mut n_iter = 0;
        let mut converged = false;

        loop {
            if maxiter.is_some_and(|cap| n_iter >= cap) {
                break;
            }

            let max_log_l = log_ls.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let dlogz = logaddexp(log_z, max_log_l + log_vol) - log_z;
            if dlogz < tol {
                converged = true;
                break;
            }

            let (worst, log_l_min) = argmin(&log_ls);
            accumulate(&mut log_z, &mut h, log_l_min, log_vol + log_shell);
            log_vol -= shrink;
            n_iter += 1;
            if let Some(pb) = pb {
                pb.inc(1);
                if n_iter % 50 == 0 {
                    pb.set_message(format!("remaining log-evidence {dlogz:.3}"));
                }
            }

            let start = self.pick_start(&log_ls, worst)?;
            let (unit, log_l) = self.evolve(&units[start], log_l_min, &mut scale)?;
            units[worst] = unit;
            log_ls[worst] = log_l;
        }

        // Drain the live points over the terminal volume.
        let log_w_live = log_vol - (self.n_live as f64).ln();
        for &log_l in &log_ls {
            accumulate(&mut log_z, &mut h, log_l, log_w_live);
        }

        Ok(NestedResult {
            log_evidence: log_z,
            log_evidence_err: (h.max(0.0) / self.n_live as f64).sqrt(),
            information: h,
            n_iter,
            converged,
        })
    }

    /// Draws the initial live points from the prior and evaluates them in
    /// parallel.
    fn initial_population(&mut self) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        let units: Vec<Vec<f64>> = (0..self.n_live)
            .map(|_| (0..self.dim).map(|_| self.rng.gen::<f64>()).collect())
            .collect();
        let thetas: Vec<Vec<f64>> = units.iter().map(|u| (self.prior_transform)(u)).collect();
        for theta in &thetas {
            if theta.len() != self.dim {
                return Err(Error::Validation(format!(
                    "Expected the prior transform to return {} values, got {}.",
                    self.dim,
                    theta.len()
                )));
            }
        }
        let log_likelihood = &self.log_likelihood;
        let log_ls: Vec<f64> = thetas
            .par_iter()
            .map(|t| finite_or_neg_inf(log_likelihood(t)))
            .collect();
        if log_ls.iter().all(|ll| *ll == f64::NEG_INFINITY) {
            return Err(Error::Sampling(
                "Live-point population collapsed: every point has zero likelihood.".to_string(),
            ));
        }
        Ok((units, log_ls))
    }

    /// Picks a random live point, other than the one being replaced, to seed
    /// the constrained random walk.
    fn pick_start(&mut self, log_ls: &[f64], worst: usize) -> Result<usize> {
        let candidates: Vec<usize> = (0..log_ls.len())
            .filter(|&i| i != worst && log_ls[i].is_finite())
            .collect();
        if candidates.is_empty() {
            return Err(Error::Sampling(
                "Live-point population collapsed: no finite-likelihood point to walk from."
                    .to_string(),
            ));
        }
        Ok(candidates[self.rng.gen_range(0..candidates.len())])
    }

    /// Random walk in the unit cube, accepting only points whose likelihood
    /// beats the current threshold. The step scale adapts to hold a useful
    /// acceptance rate as the constrained region shrinks.
    fn evolve(&mut self, start: &[f64], log_l_min: f64, scale: &mut f64) -> Result<(Vec<f64>, f64)> {
        let mut unit = start.to_vec();
        let mut log_l = f64::NEG_INFINITY;
        let mut accepts = 0;
        let mut proposals = 0;

        while accepts < TARGET_ACCEPTS {
            proposals += 1;
            if proposals > MAX_PROPOSALS {
                return Err(Error::Sampling(format!(
                    "No replacement live point found within {MAX_PROPOSALS} proposals."
                )));
            }

            let candidate: Vec<f64> = unit
                .iter()
                .map(|&u| u + *scale * self.rng.sample::<f64, _>(StandardNormal))
                .collect();
            if candidate.iter().any(|&u| !(0.0..1.0).contains(&u)) {
                *scale = (*scale * 0.9).max(1e-6);
                continue;
            }

            let theta = (self.prior_transform)(&candidate);
            let candidate_log_l = finite_or_neg_inf((self.log_likelihood)(&theta));
            if candidate_log_l.is_finite() && candidate_log_l >= log_l_min {
                unit = candidate;
                log_l = candidate_log_l;
                accepts += 1;
                *scale = (*scale * 1.1).min(1.0);
            } else {
                *scale = (*scale * 0.9).max(1e-6);
            }
        }
        Ok((unit, log_l))
    }
}

/// Adds one weighted likelihood shell to the running evidence and updates the
/// information with Skilling's recurrence.
fn accumulate(log_z: &mut f64, h: &mut f64, log_l: f64, log_w: f64) {
    // A zero-likelihood shell contributes nothing.
    if log_l == f64::NEG_INFINITY {
        return;
    }
    let log_wt = log_l + log_w;
    let log_z_new = logaddexp(*log_z, log_wt);
    let mut h_new = -log_z_new;
    let a = (log_wt - log_z_new).exp();
    if a > 0.0 {
        h_new += a * log_l;
    }
    let b = (*log_z - log_z_new).exp();
    if b > 0.0 {
        h_new += b * (*h + *log_z);
    }
    if h_new.is_finite() {
        *h = h_new;
    }
    *log_z = log_z_new;
}

/// Index and value of the smallest element.
fn argmin(values: &[f64]) -> (usize, f64) {
    let mut idx = 0;
    let mut min = values[0];
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < min {
            idx = i;
            min = v;
        }
    }
    (idx, min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

    fn normal_log_likelihood(theta: &[f64]) -> f64 {
        -0.5 * theta[0] * theta[0] - LN_SQRT_2PI
    }

    fn wide_uniform_prior(unit: &[f64]) -> Vec<f64> {
        unit.iter().map(|u| -10.0 + 20.0 * u).collect()
    }

    #[test]
    fn test_validation() {
        assert!(NestedSampler::new(normal_log_likelihood, wide_uniform_prior, 0, 100).is_err());
        assert!(NestedSampler::new(normal_log_likelihood, wide_uniform_prior, 1, 1).is_err());
    }

    #[test]
    fn test_bad_prior_transform_rejected() {
        let mut sampler =
            NestedSampler::new(normal_log_likelihood, |_: &[f64]| vec![0.0, 0.0], 1, 50)
                .unwrap()
                .set_seed(1);
        assert!(matches!(
            sampler.run(0.1, Some(10)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_collapsed_population_rejected() {
        let mut sampler =
            NestedSampler::new(|_: &[f64]| f64::NEG_INFINITY, wide_uniform_prior, 1, 50)
                .unwrap()
                .set_seed(2);
        assert!(matches!(sampler.run(0.1, None), Err(Error::Sampling(_))));
    }

    #[test]
    fn test_gaussian_evidence() {
        // Z = integral of N(0, 1) over U(-10, 10) = 1/20 up to truncation.
        let mut sampler = NestedSampler::new(normal_log_likelihood, wide_uniform_prior, 1, 200)
            .unwrap()
            .set_seed(3);
        let res = sampler.run(0.1, None).unwrap();
        assert!(res.converged);
        assert_abs_diff_eq!(res.log_evidence, -(20.0_f64.ln()), epsilon = 0.5);
        assert!(res.log_evidence_err > 0.0);
        assert!(res.log_evidence_err < 0.5);
        assert!(res.information.is_finite());
    }

    #[test]
    fn test_maxiter_cap() {
        let mut sampler = NestedSampler::new(normal_log_likelihood, wide_uniform_prior, 1, 100)
            .unwrap()
            .set_seed(4);
        let res = sampler.run(0.1, Some(10)).unwrap();
        assert_eq!(res.n_iter, 10);
        assert!(!res.converged);
        assert!(res.log_evidence.is_finite());
        assert!(res.log_evidence_err.is_finite());
    }

    #[test]
    fn test_seed_reproducibility() {
        let run = |seed| {
            let mut sampler =
                NestedSampler::new(normal_log_likelihood, wide_uniform_prior, 1, 100)
                    .unwrap()
                    .set_seed(seed);
            sampler.run(0.1, Some(200)).unwrap()
        };
        let (a, b) = (run(9), run(9));
        assert_eq!(a.log_evidence, b.log_evidence);
        assert_eq!(a.n_iter, b.n_iter);
    }

    #[test]
    fn test_accumulate_recurrence() {
        let mut log_z = f64::NEG_INFINITY;
        let mut h = 0.0;
        accumulate(&mut log_z, &mut h, 1.0, -1.0);
        assert_abs_diff_eq!(log_z, 0.0, epsilon = 1e-12);
        accumulate(&mut log_z, &mut h, f64::NEG_INFINITY, -1.0);
        assert_abs_diff_eq!(log_z, 0.0, epsilon = 1e-12);
        assert!(h.is_finite());
    }

    #[test]
    fn test_argmin() {
        assert_eq!(argmin(&[3.0, 1.0, 2.0]), (1, 1.0));
        assert_eq!(argmin(&[f64::NEG_INFINITY, 1.0]), (0, f64::NEG_INFINITY));
    }
}
