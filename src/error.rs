//! Error taxonomy shared across the crate.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when construction arguments are malformed, e.g. empty sample
    /// batches or confidence-interval points that are not an ordered pair of
    /// percentiles in [0, 100].
    #[error("validation error: {0}")]
    Validation(String),

    /// Returned when a sampling run cannot produce a result, e.g. every
    /// walker or live point starts with a non-finite log-probability.
    #[error("sampling error: {0}")]
    Sampling(String),
}

pub type Result<T> = core::result::Result<T, Error>;
