use thiserror::Error;

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was not attempted.
    #[error("circuit is open; call not permitted")]
    CircuitOpen,

    /// The half-open probe budget is exhausted; the call was not attempted.
    #[error("half-open probe limit reached; call not permitted")]
    HalfOpenLimitExceeded,

    /// An error returned by the protected call.
    #[error("upstream error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// True for the two short-circuit variants that never reached upstream.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CircuitBreakerError::CircuitOpen | CircuitBreakerError::HalfOpenLimitExceeded
        )
    }

    /// Returns the upstream error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(err: E) -> Self {
        CircuitBreakerError::Inner(err)
    }
}
