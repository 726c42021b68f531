//! End-to-end tests of the high-level drivers against a linear model
//! `y = gradient * x + intercept` with Gaussian uncertainties.

use bayesfit::relationship::Relationship;
use bayesfit::sampling::{
    broad_uniform_prior, mcmc, mcmc_with_prior, nested_sampling, nested_sampling_with_prior,
    McmcSettings, NestedSettings,
};
use std::f64::consts::PI;

struct LinearRelationship {
    x: Vec<f64>,
    y: Vec<f64>,
    y_err: f64,
    estimates: Vec<f64>,
}

impl LinearRelationship {
    /// Ten exact points on y = 2x + 1 with unit uncertainties, so the
    /// posterior is centered exactly on (2, 1).
    fn example() -> Self {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.0 * x + 1.0).collect();
        Self {
            x,
            y,
            y_err: 1.0,
            estimates: vec![2.0, 1.0],
        }
    }
}

impl Relationship for LinearRelationship {
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        let (gradient, intercept) = (theta[0], theta[1]);
        let var = self.y_err * self.y_err;
        self.x
            .iter()
            .zip(&self.y)
            .map(|(&x, &y)| {
                let residual = y - (gradient * x + intercept);
                -0.5 * (residual * residual / var + (2.0 * PI * var).ln())
            })
            .sum()
    }

    fn variables(&self) -> Vec<f64> {
        self.estimates.clone()
    }

    fn variable_names(&self) -> Vec<String> {
        vec!["gradient".to_string(), "intercept".to_string()]
    }
}

/// A one-parameter model: five observations of a common mean, all zero.
struct ConstantRelationship;

impl Relationship for ConstantRelationship {
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        let mu = theta[0];
        (0..5).map(|_| -0.5 * (mu * mu + (2.0 * PI).ln())).sum()
    }

    fn variables(&self) -> Vec<f64> {
        vec![0.0]
    }
}

#[test]
fn test_mcmc_short_run_shapes() {
    // 100 walkers (the default) times 10 production steps gives 1000 samples
    // per parameter.
    let model = LinearRelationship::example();
    let settings = McmcSettings {
        n_burn: 10,
        n_samples: 10,
        seed: Some(42),
        ..Default::default()
    };
    let dists = mcmc(&model, &settings).unwrap();
    assert_eq!(dists.len(), 2);
    for dist in &dists {
        assert_eq!(dist.size(), 1000);
        assert_eq!(dist.con_int().len(), 2);
        assert!(dist.con_int()[0] <= dist.n() && dist.n() <= dist.con_int()[1]);
    }
    assert_eq!(dists[0].name, "gradient");
    assert_eq!(dists[1].name, "intercept");
}

#[test]
fn test_mcmc_custom_prior_shapes() {
    let model = LinearRelationship::example();
    let prior = |unit: &[f64]| vec![4.0 * unit[0], -5.0 + 10.0 * unit[1]];
    let settings = McmcSettings {
        n_burn: 10,
        n_samples: 10,
        seed: Some(42),
        ..Default::default()
    };
    let dists = mcmc_with_prior(&model, &prior, &settings).unwrap();
    assert_eq!(dists.len(), 2);
    assert_eq!(dists[0].size(), 1000);
    assert_eq!(dists[1].size(), 1000);
    // The prior bounds the gradient to [0, 4].
    assert!(dists[0].samples().iter().all(|&v| (0.0..=4.0).contains(&v)));
}

#[test]
fn test_mcmc_parameter_recovery() {
    let model = LinearRelationship::example();
    let settings = McmcSettings {
        seed: Some(7),
        ..Default::default()
    };
    let dists = mcmc(&model, &settings).unwrap();
    assert_eq!(dists[0].size(), 100 * 500);
    assert!(
        (dists[0].n() - 2.0).abs() < 0.2,
        "gradient median {}",
        dists[0].n()
    );
    assert!(
        (dists[1].n() - 1.0).abs() < 1.0,
        "intercept median {}",
        dists[1].n()
    );
}

#[test]
fn test_mcmc_seed_reproducibility() {
    let model = LinearRelationship::example();
    let settings = McmcSettings {
        n_burn: 20,
        n_samples: 20,
        seed: Some(3),
        ..Default::default()
    };
    let a = mcmc(&model, &settings).unwrap();
    let b = mcmc(&model, &settings).unwrap();
    assert_eq!(a[0].samples(), b[0].samples());
    assert_eq!(a[1].n(), b[1].n());
}

#[test]
fn test_nested_sampling_capped_run_is_finite() {
    let model = LinearRelationship::example();
    let settings = NestedSettings {
        n_live: 100,
        maxiter: Some(10),
        seed: Some(5),
        ..Default::default()
    };
    let evidence = nested_sampling(&model, &settings).unwrap();
    assert!(evidence.n.is_finite(), "log-evidence {evidence}");
    assert!(evidence.s.is_finite() && evidence.s >= 0.0);
}

#[test]
fn test_nested_sampling_evidence_recovery() {
    // Analytic evidence for five zero observations of a common mean under a
    // U(-10, 10) prior: ln Z = ln(sqrt(2 pi / 5)) - 2.5 ln(2 pi) - ln 20.
    let expected = 0.5 * (2.0 * PI / 5.0).ln() - 2.5 * (2.0 * PI).ln() - 20.0_f64.ln();
    let prior = |unit: &[f64]| vec![-10.0 + 20.0 * unit[0]];
    let settings = NestedSettings {
        n_live: 200,
        seed: Some(13),
        ..Default::default()
    };
    let evidence = nested_sampling_with_prior(&ConstantRelationship, &prior, &settings).unwrap();
    assert!(
        (evidence.n - expected).abs() < 0.5,
        "expected ln Z ~ {expected}, got {evidence}"
    );
}

#[test]
fn test_default_prior_spans_the_estimates() {
    let model = LinearRelationship::example();
    let prior = broad_uniform_prior(&model.variables());
    assert_eq!(prior(&[0.5, 0.5]), vec![2.0, 1.0]);
    assert_eq!(prior(&[0.0, 0.0]), vec![-18.0, -9.0]);
    assert_eq!(prior(&[1.0, 1.0]), vec![22.0, 11.0]);
}
