pub mod color_refinement;
pub mod commutative;
pub mod factor_graph;
pub mod fg_build;
mod fg_parser;
pub mod lifting;
pub mod model_export;
pub mod parfactor;
pub mod pfg_build;
pub mod query;
pub mod similarity;

use thiserror::Error;

pub(crate) type NamedList<T> = indexmap::IndexMap<String, T>;

/// Index of a value within a variable's range.
pub type RangeVal = usize;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiftError {
    #[error("Lifting threshold {0} is outside [0, 1].")]
    InvalidThreshold(f64),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Factor graph invariant violated: {0}")]
    InvariantViolation(String),
    #[error(
        "Factor {0} collapses into a counting argument but carries no commutativity annotation."
    )]
    MissingCommutativityAnnotation(String),
    #[error("Range [{}] cannot be mapped to an engine type.", .0.join(", "))]
    UnsupportedRange(Vec<String>),
}
