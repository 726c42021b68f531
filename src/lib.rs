pub mod distribution;
pub mod ensemble;
pub mod error;
pub mod nested;
pub mod relationship;
pub mod sampling;
pub mod shapiro;
pub mod stats;
