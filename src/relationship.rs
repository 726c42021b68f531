//! The trait a user-supplied model implements so the samplers can evaluate
//! its posterior.

/// A model whose parameters are to be estimated.
///
/// Implementations provide an unnormalized log-likelihood surface over the
/// free parameters plus current point estimates. `log_likelihood` must be
/// pure: the same `theta` always yields the same value, finite or negative
/// infinity (which both samplers absorb as a rejected point).
pub trait Relationship {
    /// The log-likelihood of the data given the parameter vector `theta`.
    fn log_likelihood(&self, theta: &[f64]) -> f64;

    /// Current point estimates for the free parameters, used to center the
    /// default broad uniform prior.
    fn variables(&self) -> Vec<f64>;

    /// The number of free parameters.
    fn n_variables(&self) -> usize {
        self.variables().len()
    }

    /// Labels for the free parameters, used to name the posterior
    /// distributions.
    fn variable_names(&self) -> Vec<String> {
        (0..self.n_variables()).map(|i| format!("p{i}")).collect()
    }
}
