//! Ordered fallback over equivalent endpoint variants.
//!
//! Portals often expose the same data under several endpoint generations;
//! callers try them newest-first. The chain stops at the first success.
//! When every candidate fails, the chain surfaces the FIRST error, the
//! primary endpoint's.

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::ResolveError;

/// Awaits candidates in order and returns the first `Ok`.
///
/// Candidates are lazy: a later future is never polled once an earlier one
/// succeeds. `label` names the chain in logs and in the empty-chain error.
///
/// # Errors
///
/// The first candidate's error when all fail; [`ResolveError::Unexpected`]
/// for an empty chain.
pub async fn first_success<'a, T>(
    label: &str,
    candidates: Vec<BoxFuture<'a, Result<T, ResolveError>>>,
) -> Result<T, ResolveError> {
    let mut first_error: Option<ResolveError> = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        match candidate.await {
            Ok(value) => {
                if index > 0 {
                    debug!(label, index, "fallback candidate succeeded");
                }
                return Ok(value);
            }
            Err(error) => {
                debug!(label, index, error = %error, "fallback candidate failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    Err(first_error
        .unwrap_or_else(|| ResolveError::unexpected(label, "empty fallback chain")))
}
