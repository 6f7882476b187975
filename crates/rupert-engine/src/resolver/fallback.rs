//! Ordered fallback over model endpoints.
//!
//! Every candidate is attempted at most once, in order; the first success
//! wins. There is no retry of a failed candidate: a later endpoint is the
//! retry.

use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// One failed attempt, kept for diagnostics.
#[derive(Debug)]
pub struct AttemptFailure<C, E> {
    pub candidate: C,
    pub error: E,
}

/// Every candidate failed.
#[derive(Debug)]
pub struct Exhausted<C, E> {
    pub failures: Vec<AttemptFailure<C, E>>,
}

impl<C, E> Exhausted<C, E> {
    pub fn attempts(&self) -> usize {
        self.failures.len()
    }
}

/// Runs `attempt` on each candidate until one succeeds.
///
/// Returns the winning candidate with its value, or every failure in order.
pub async fn try_in_order<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Result<(C, T), Exhausted<C, E>>
where
    C: Clone + Display,
    E: Display,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        debug!(candidate = %candidate, "fallback: trying");
        match attempt(candidate.clone()).await {
            Ok(value) => return Ok((candidate, value)),
            Err(error) => {
                warn!(candidate = %candidate, error = %error, "fallback: attempt failed");
                failures.push(AttemptFailure { candidate, error });
            }
        }
    }
    Err(Exhausted { failures })
}
