//! Domain error model.

use thiserror::Error;

use crate::validation::Problem;

/// An order failed one or more business rules.
///
/// Carries every problem found, not just the first one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", join_problems(.problems))]
pub struct ValidationError {
    pub problems: Vec<Problem>,
}

impl ValidationError {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }
}

fn join_problems(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
