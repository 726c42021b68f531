//! An affine-invariant ensemble sampler using the Goodman & Weare (2010)
//! stretch move.
//!
//! The ensemble is split into two halves; each half proposes stretch moves
//! against walkers drawn from the other half, so every walker in a half can
//! be evaluated in parallel. Proposals whose log-probability is non-finite
//! are always rejected, which lets a bounded prior absorb out-of-support
//! points without special casing.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array3, Axis};
use rand::prelude::*;
use rayon::prelude::*;

/// Default stretch-move scale parameter from Goodman & Weare (2010).
pub const DEFAULT_STRETCH_SCALE: f64 = 2.0;

/// An ensemble of walkers exploring a log-probability surface.
pub struct EnsembleSampler<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    log_prob: F,
    walkers: Array2<f64>,
    log_probs: Vec<f64>,
    n_walkers: usize,
    dim: usize,
    a: f64,
    rng: SmallRng,
    n_accepted: u64,
    n_proposed: u64,
}

impl<F> EnsembleSampler<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    /// Creates a sampler from a log-probability function and an initial
    /// walker ensemble of shape `(n_walkers, dim)`.
    ///
    /// The walker count must be even (the stretch move updates the ensemble
    /// half against half) and at least twice the dimensionality. Every
    /// walker's initial log-probability is evaluated up front; an ensemble
    /// where all of them are non-finite cannot move and is rejected.
    pub fn new(log_prob: F, initial: Array2<f64>) -> Result<Self> {
        let (n_walkers, dim) = initial.dim();
        if dim == 0 {
            return Err(Error::Validation(
                "Expected at least one dimension.".to_string(),
            ));
        }
        if n_walkers % 2 != 0 || n_walkers < 2 * dim {
            return Err(Error::Validation(format!(
                "Expected an even number of walkers, at least {}, got {n_walkers}.",
                2 * dim
            )));
        }

        let rows: Vec<Vec<f64>> = initial.axis_iter(Axis(0)).map(|w| w.to_vec()).collect();
        let log_probs: Vec<f64> = rows
            .par_iter()
            .map(|w| finite_or_neg_inf(log_prob(w)))
            .collect();
        if log_probs.iter().all(|lp| *lp == f64::NEG_INFINITY) {
            return Err(Error::Sampling(
                "Every initial walker has non-finite log-probability.".to_string(),
            ));
        }

        Ok(Self {
            log_prob,
            walkers: initial,
            log_probs,
            n_walkers,
            dim,
            a: DEFAULT_STRETCH_SCALE,
            rng: SmallRng::seed_from_u64(thread_rng().gen::<u64>()),
            n_accepted: 0,
            n_proposed: 0,
        })
    }

    /// Sets the random seed (builder style), making runs reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Runs the ensemble for `n_steps` iterations and returns the retained
    /// states as an array of shape `(n_steps - discard, n_walkers, dim)`.
    pub fn run(&mut self, n_steps: usize, discard: usize) -> Result<Array3<f64>> {
        self.run_inner(n_steps, discard, None)
    }

    /// Same as [`EnsembleSampler::run`] but renders a progress bar.
    pub fn run_with_progress(&mut self, n_steps: usize, discard: usize) -> Result<Array3<f64>> {
        let pb = ProgressBar::new(n_steps as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        let out = self.run_inner(n_steps, discard, Some(&pb));
        pb.finish_with_message("Done!");
        out
    }

    fn run_inner(
        &mut self,
        n_steps: usize,
        discard: usize,
        pb: Option<&ProgressBar>,
    ) -> Result<Array3<f64>> {
        if discard > n_steps {
            return Err(Error::Validation(format!(
                "Expected discard <= n_steps, got {discard} > {n_steps}."
            )));
        }
        let keep = n_steps - discard;
        let mut out = Array3::<f64>::zeros((keep, self.n_walkers, self.dim));

        for step in 0..n_steps {
            self.step();
            if step >= discard {
                out.index_axis_mut(Axis(0), step - discard)
                    .assign(&self.walkers);
            }
            if let Some(pb) = pb {
                pb.inc(1);
            }
        }
        Ok(out)
    }

    /// Advances every walker by one stretch move.
    fn step(&mut self) {
        let half = self.n_walkers / 2;
        self.update_group(0..half, half..self.n_walkers);
        self.update_group(half..self.n_walkers, 0..half);
    }

    /// Proposes stretch moves for `active` against complements drawn from
    /// `other`, evaluating all proposals in parallel before the sequential
    /// accept/reject pass.
    fn update_group(
        &mut self,
        active: std::ops::Range<usize>,
        other: std::ops::Range<usize>,
    ) {
        let mut proposals: Vec<Vec<f64>> = Vec::with_capacity(active.len());
        let mut zs: Vec<f64> = Vec::with_capacity(active.len());
        for k in active.clone() {
            let z = self.sample_z();
            let j = self.rng.gen_range(other.clone());
            let proposal: Vec<f64> = (0..self.dim)
                .map(|d| self.walkers[[j, d]] + z * (self.walkers[[k, d]] - self.walkers[[j, d]]))
                .collect();
            proposals.push(proposal);
            zs.push(z);
        }

        let log_prob = &self.log_prob;
        let new_log_probs: Vec<f64> = proposals
            .par_iter()
            .map(|p| finite_or_neg_inf(log_prob(p)))
            .collect();

        for (idx, k) in active.enumerate() {
            self.n_proposed += 1;
            let new_lp = new_log_probs[idx];
            if new_lp == f64::NEG_INFINITY {
                continue;
            }
            let cur_lp = self.log_probs[k];
            let log_accept =
                (self.dim as f64 - 1.0) * zs[idx].ln() + new_lp - cur_lp;
            let accept = cur_lp == f64::NEG_INFINITY || {
                let u: f64 = self.rng.gen();
                u.ln() < log_accept
            };
            if accept {
                for d in 0..self.dim {
                    self.walkers[[k, d]] = proposals[idx][d];
                }
                self.log_probs[k] = new_lp;
                self.n_accepted += 1;
            }
        }
    }

    /// Draws a stretch factor from g(z) ~ 1/sqrt(z) on [1/a, a].
    fn sample_z(&mut self) -> f64 {
        let u: f64 = self.rng.gen();
        ((self.a - 1.0) * u + 1.0).powi(2) / self.a
    }

    /// The fraction of proposals accepted so far.
    pub fn acceptance_rate(&self) -> f64 {
        if self.n_proposed == 0 {
            return 0.0;
        }
        self.n_accepted as f64 / self.n_proposed as f64
    }
}

/// Maps NaN and infinities onto negative infinity so rejection absorbs them.
pub(crate) fn finite_or_neg_inf(lp: f64) -> f64 {
    if lp.is_finite() {
        lp
    } else {
        f64::NEG_INFINITY
    }
}
