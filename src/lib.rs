//! Reference-allele frequency estimation from sequencing read counts.
//!
//! Each individual is diploid and the population is assumed to be in Hardy-Weinberg
//! equilibrium. Reads carry a single, shared error rate. [`run_em`] and [`Estimator`]
//! iterate an EM update of the frequency over a [`Dataset`] of per-individual read counts.

pub mod em;
pub mod error;
pub mod likelihood;
pub mod model;
pub mod output;
pub mod reader;

pub use em::{
    EmConfig, EmStep, EmTrace, Estimator, GenotypeCall, UpdateRule, call_genotype,
    expected_genotype, hard_update, run_em, soft_update,
};
pub use error::{CustomError, InvalidArgument, Result};
pub use likelihood::{likelihood, log_likelihood, marginal_log_likelihood, posterior, prior, weight};
pub use model::{Dataset, Genotype, Observation};
