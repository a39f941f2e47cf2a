//! Selection of the pull-request iteration pair to review.

use serde::Deserialize;
use thiserror::Error;

/// One numbered snapshot of a pull request, created each time new
/// commits are pushed to it.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestIteration {
    pub id: Option<i32>,
}

/// The iteration pair handed to the changed-paths fetch.
///
/// The pair is positional, not min/max ordered: callers pass it through
/// unchanged as `(current_iteration, iteration_to_compare)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPair {
    pub current_iteration: i32,
    pub iteration_to_compare: i32,
}

/// A pull request reported zero iterations. Every pull request has at
/// least one, so this indicates a broken upstream and aborts the run.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no iterations found for this pull request")]
pub struct NoIterationsError;

/// Pick the two iterations whose difference gets scanned.
///
/// Only the newest increment of change is ever reviewed: the two
/// most-recently-created iterations, taken strictly by position in the
/// list. A sole iteration is compared against the virtual base
/// revision 0.
pub fn select_iterations_to_compare(
    iterations: &[PullRequestIteration],
) -> Result<IterationPair, NoIterationsError> {
    match iterations {
        [] => Err(NoIterationsError),
        [_only] => Ok(IterationPair {
            current_iteration: 1,
            iteration_to_compare: 0,
        }),
        [.., second_to_last, last] => Ok(IterationPair {
            current_iteration: second_to_last.id.unwrap_or_default(),
            iteration_to_compare: last.id.unwrap_or_default(),
        }),
    }
}
