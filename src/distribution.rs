//! The [`Distribution`] container: an append-only set of samples from some
//! probability distribution, summarized by its median, a confidence interval,
//! and a Shapiro–Wilk normality classification.

use crate::error::{Error, Result};
use crate::shapiro::shapiro_wilk;
use crate::stats;
use rand::prelude::*;
use std::fmt;

/// Default confidence-interval percentiles (a 95 % interval).
pub const DEFAULT_CI_POINTS: [f64; 2] = [2.5, 97.5];

/// Significance level for the normality classification.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Size of the with-replacement resample the Shapiro–Wilk test runs on. The
/// test becomes overly sensitive at large sample counts, so the same
/// fixed-size resample is drawn whatever the stored sample count.
pub const NORMALITY_SUBSAMPLE: usize = 500;

/// A summarized set of samples from a probability distribution.
///
/// Samples are append-only; every mutation recomputes the median, the
/// confidence interval, and the normality classification. The normality test
/// subsamples with an owned RNG, so repeated classifications of the same data
/// may flip near the decision boundary; seed via [`Distribution::set_seed`]
/// when reproducibility matters.
#[derive(Debug, Clone)]
pub struct Distribution {
    /// A human-readable name, used when the distribution is printed.
    pub name: String,
    /// The unit of the samples, used when the distribution is printed.
    pub unit: String,
    samples: Vec<f64>,
    ci_points: [f64; 2],
    con_int: Vec<f64>,
    n: f64,
    s: Option<f64>,
    normal: bool,
    rng: SmallRng,
}

impl Distribution {
    /// Creates a distribution from `samples` with default confidence-interval
    /// percentiles and an entropy-seeded RNG.
    pub fn new(samples: &[f64]) -> Result<Self> {
        Self::with_options(samples, None, None)
    }

    /// Creates a distribution with explicit confidence-interval percentiles
    /// and/or a fixed RNG seed.
    ///
    /// `ci_points` must hold exactly two percentiles in `[0, 100]` with the
    /// first no larger than the second.
    pub fn with_options(
        samples: &[f64],
        ci_points: Option<&[f64]>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let ci_points = match ci_points {
            None => DEFAULT_CI_POINTS,
            Some(&[lo, hi]) => {
                if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo > hi {
                    return Err(Error::Validation(format!(
                        "Expected ci_points to be an ordered pair of percentiles in [0, 100], got [{lo}, {hi}]."
                    )));
                }
                [lo, hi]
            }
            Some(other) => {
                return Err(Error::Validation(format!(
                    "Expected exactly 2 ci_points, got {}.",
                    other.len()
                )));
            }
        };
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let mut dist = Self {
            name: "Distribution".to_string(),
            unit: "dimensionless".to_string(),
            samples: Vec::new(),
            ci_points,
            con_int: Vec::new(),
            n: f64::NAN,
            s: None,
            normal: false,
            rng,
        };
        dist.add_samples(samples)?;
        Ok(dist)
    }

    /// Sets the name (builder style).
    pub fn set_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the unit (builder style).
    pub fn set_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = unit.into();
        self
    }

    /// Reseeds the subsampling RNG and reruns the normality classification,
    /// making the classification reproducible from here on.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self.check_normality(DEFAULT_ALPHA);
        self
    }

    /// The stored samples, in insertion order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// The number of stored samples.
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// The median of the samples.
    pub fn n(&self) -> f64 {
        self.n
    }

    /// The symmetric uncertainty: the population standard deviation of the
    /// samples when they are classified as normal, `None` otherwise.
    pub fn s(&self) -> Option<f64> {
        self.s
    }

    /// The confidence-interval bounds. Empty until more than one sample is
    /// stored, then exactly two values at the configured percentiles.
    pub fn con_int(&self) -> &[f64] {
        &self.con_int
    }

    /// The percentiles at which the confidence interval is evaluated.
    pub fn ci_points(&self) -> [f64; 2] {
        self.ci_points
    }

    /// Whether the samples are currently classified as normally distributed.
    pub fn normal(&self) -> bool {
        self.normal
    }

    /// Appends `samples` and recomputes all summary statistics.
    pub fn add_samples(&mut self, samples: &[f64]) -> Result<()> {
        if samples.is_empty() {
            return Err(Error::Validation(
                "Expected a non-empty batch of samples.".to_string(),
            ));
        }
        self.samples.extend_from_slice(samples);

        let mut sorted = self.samples.clone();
        sorted.sort_unstable_by(stats::cmp_f64);
        self.n = stats::percentile_of_sorted(&sorted, 50.0);
        self.con_int.clear();
        if sorted.len() > 1 {
            self.con_int
                .push(stats::percentile_of_sorted(&sorted, self.ci_points[0]));
            self.con_int
                .push(stats::percentile_of_sorted(&sorted, self.ci_points[1]));
        }
        self.check_normality(DEFAULT_ALPHA);
        Ok(())
    }

    /// Classifies the samples as normal or not at significance level `alpha`
    /// using the Shapiro–Wilk test, updating `normal` and `s`.
    ///
    /// Sample sets with 3 or fewer points are never classified as normal.
    /// The test always runs on a [`NORMALITY_SUBSAMPLE`]-point
    /// with-replacement resample of the stored samples. A degenerate resample
    /// (e.g. all values identical) degrades to a `false` classification
    /// rather than an error.
    pub fn check_normality(&mut self, alpha: f64) -> bool {
        if self.samples.len() <= 3 {
            self.normal = false;
            self.s = None;
            return false;
        }
        let test_samples: Vec<f64> = (0..NORMALITY_SUBSAMPLE)
            .map(|_| self.samples[self.rng.gen_range(0..self.samples.len())])
            .collect();
        self.normal = match shapiro_wilk(&test_samples) {
            Ok(res) => res.p_value > alpha,
            Err(_) => false,
        };
        self.s = if self.normal {
            Some(stats::std(&self.samples))
        } else {
            None
        };
        self.normal
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Distribution: '{}'", self.name)?;
        writeln!(f, "Size: {}", self.size())?;
        if self.size() > 5 {
            writeln!(
                f,
                "Samples: [{:.2e} {:.2e} ... {:.2e} {:.2e}]",
                self.samples[0],
                self.samples[1],
                self.samples[self.size() - 2],
                self.samples[self.size() - 1]
            )?;
        } else {
            let preview: Vec<String> = self.samples.iter().map(|v| format!("{v:.2e}")).collect();
            writeln!(f, "Samples: [{}]", preview.join(" "))?;
        }
        writeln!(f, "Median: {:.6e} {}", self.n, self.unit)?;
        match self.s {
            Some(s) => writeln!(f, "Symmetric Error: {s:.6e}")?,
            None => writeln!(f, "Symmetric Error: undefined")?,
        }
        if self.con_int.len() == 2 {
            writeln!(
                f,
                "Confidence interval: [{:.6e}, {:.6e}]",
                self.con_int[0], self.con_int[1]
            )?;
        }
        writeln!(
            f,
            "Confidence interval points: [{}, {}]",
            self.ci_points[0], self.ci_points[1]
        )?;
        match (self.s, self.con_int.len()) {
            (Some(s), _) => writeln!(f, "Reporting Value: {:.6e} +/- {s:.6e}", self.n)?,
            (None, 2) => writeln!(
                f,
                "Reporting Value: {:.6e}+{:.6e}-{:.6e}",
                self.n, self.con_int[1], self.con_int[0]
            )?,
            _ => writeln!(f, "Reporting Value: {:.6e}", self.n)?,
        }
        write!(f, "Normal: {}", self.normal)
    }
}

/// A value with a symmetric uncertainty, e.g. a log-evidence estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub n: f64,
    pub s: f64,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} +/- {}", self.n, self.s)
    }
}
