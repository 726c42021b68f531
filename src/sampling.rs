//! High-level drivers tying a [`Relationship`] to the samplers: posterior
//! estimation via the ensemble sampler and evidence estimation via nested
//! sampling.
//!
//! Both drivers work through a prior transform mapping unit-cube vectors to
//! parameter space, so any prior expressible as an inverse CDF plugs in. The
//! ensemble sampler walks the unit cube directly (points outside it get
//! negative-infinite log-probability), which makes the prior measure exact
//! without a separate density term.

use crate::distribution::Distribution;
use crate::distribution::Measurement;
use crate::ensemble::EnsembleSampler;
use crate::error::{Error, Result};
use crate::nested::NestedSampler;
use crate::relationship::Relationship;
use ndarray::Array2;
use rand::prelude::*;

/// Settings for the ensemble MCMC driver.
#[derive(Debug, Clone)]
pub struct McmcSettings {
    /// Number of walkers. Raised to at least twice the dimensionality and
    /// rounded up to an even count.
    pub n_walkers: usize,
    /// Burn-in steps discarded from the chain.
    pub n_burn: usize,
    /// Production steps retained per walker.
    pub n_samples: usize,
    /// Seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for McmcSettings {
    fn default() -> Self {
        Self {
            n_walkers: 100,
            n_burn: 500,
            n_samples: 500,
            seed: None,
        }
    }
}

/// Settings for the nested-sampling driver.
#[derive(Debug, Clone)]
pub struct NestedSettings {
    /// Number of live points.
    pub n_live: usize,
    /// Termination tolerance on the estimated remaining log-evidence.
    pub tol: f64,
    /// Optional iteration cap; capped runs may stop before convergence.
    pub maxiter: Option<usize>,
    /// Seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for NestedSettings {
    fn default() -> Self {
        Self {
            n_live: 500,
            tol: 0.1,
            maxiter: None,
            seed: None,
        }
    }
}

/// Builds the default prior transform: an independent broad uniform per
/// parameter, `U(v - 10|v|, v + 10|v|)` around each point estimate `v`, with
/// `U(-10, 10)` for parameters whose estimate is exactly zero.
pub fn broad_uniform_prior(variables: &[f64]) -> impl Fn(&[f64]) -> Vec<f64> + Sync {
    let bounds: Vec<(f64, f64)> = variables
        .iter()
        .map(|&v| {
            if v == 0.0 {
                (-10.0, 10.0)
            } else {
                (v - 10.0 * v.abs(), v + 10.0 * v.abs())
            }
        })
        .collect();
    move |unit: &[f64]| {
        unit.iter()
            .zip(&bounds)
            .map(|(&u, &(lo, hi))| lo + u * (hi - lo))
            .collect()
    }
}

/// Samples the posterior of `relationship` under the default broad uniform
/// prior, returning one [`Distribution`] per free parameter.
pub fn mcmc<R>(relationship: &R, settings: &McmcSettings) -> Result<Vec<Distribution>>
where
    R: Relationship + Sync,
{
    let prior = broad_uniform_prior(&relationship.variables());
    mcmc_with_prior(relationship, &prior, settings)
}

/// Samples the posterior of `relationship` under a custom prior transform.
///
/// Every retained production step of every walker contributes one sample, so
/// each returned distribution holds `n_walkers * n_samples` values.
pub fn mcmc_with_prior<R, P>(
    relationship: &R,
    prior: &P,
    settings: &McmcSettings,
) -> Result<Vec<Distribution>>
where
    R: Relationship + Sync,
    P: Fn(&[f64]) -> Vec<f64> + Sync,
{
    let dim = relationship.n_variables();
    if dim == 0 {
        return Err(Error::Validation(
            "Expected at least one free parameter.".to_string(),
        ));
    }
    check_prior_dim(prior, dim)?;
    let names = relationship.variable_names();
    if names.len() != dim {
        return Err(Error::Validation(format!(
            "Expected {dim} variable names, got {}.",
            names.len()
        )));
    }

    let mut n_walkers = settings.n_walkers.max(2 * dim);
    if n_walkers % 2 == 1 {
        n_walkers += 1;
    }

    let mut rng = match settings.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let initial = Array2::from_shape_fn((n_walkers, dim), |_| rng.gen::<f64>());

    let log_prob = |unit: &[f64]| {
        if unit.iter().any(|&u| !(0.0..1.0).contains(&u)) {
            return f64::NEG_INFINITY;
        }
        relationship.log_likelihood(&prior(unit))
    };
    let mut sampler = EnsembleSampler::new(log_prob, initial)?;
    if let Some(seed) = settings.seed {
        sampler = sampler.set_seed(seed + 1);
    }
    let chain = sampler.run(settings.n_burn + settings.n_samples, settings.n_burn)?;

    // Map every retained unit-cube state back to parameter space, then
    // flatten walkers and steps into one sample set per parameter.
    let mut per_param: Vec<Vec<f64>> = (0..dim)
        .map(|_| Vec::with_capacity(settings.n_samples * n_walkers))
        .collect();
    for step in chain.outer_iter() {
        for walker in step.outer_iter() {
            let theta = prior(&walker.to_vec());
            for (d, value) in theta.into_iter().enumerate() {
                per_param[d].push(value);
            }
        }
    }

    per_param
        .into_iter()
        .enumerate()
        .map(|(d, samples)| {
            let seed = settings.seed.map(|s| s + 2 + d as u64);
            Ok(Distribution::with_options(&samples, None, seed)?.set_name(names[d].clone()))
        })
        .collect()
}

/// Estimates the log-evidence of `relationship` under the default broad
/// uniform prior.
pub fn nested_sampling<R>(relationship: &R, settings: &NestedSettings) -> Result<Measurement>
where
    R: Relationship + Sync,
{
    let prior = broad_uniform_prior(&relationship.variables());
    nested_sampling_with_prior(relationship, &prior, settings)
}

/// Estimates the log-evidence of `relationship` under a custom prior
/// transform, returned as a value with a symmetric uncertainty.
pub fn nested_sampling_with_prior<R, P>(
    relationship: &R,
    prior: &P,
    settings: &NestedSettings,
) -> Result<Measurement>
where
    R: Relationship + Sync,
    P: Fn(&[f64]) -> Vec<f64> + Sync,
{
    let dim = relationship.n_variables();
    if dim == 0 {
        return Err(Error::Validation(
            "Expected at least one free parameter.".to_string(),
        ));
    }
    check_prior_dim(prior, dim)?;

    let mut sampler = NestedSampler::new(
        |theta: &[f64]| relationship.log_likelihood(theta),
        |unit: &[f64]| prior(unit),
        dim,
        settings.n_live,
    )?;
    if let Some(seed) = settings.seed {
        sampler = sampler.set_seed(seed);
    }
    let result = sampler.run(settings.tol, settings.maxiter)?;
    Ok(Measurement {
        n: result.log_evidence,
        s: result.log_evidence_err,
    })
}

fn check_prior_dim<P>(prior: &P, dim: usize) -> Result<()>
where
    P: Fn(&[f64]) -> Vec<f64>,
{
    let probe = prior(&vec![0.5; dim]);
    if probe.len() != dim {
        return Err(Error::Validation(format!(
            "Expected the prior transform to return {dim} values, got {}.",
            probe.len()
        )));
    }
    Ok(())
}
