use thiserror::Error;

/// Errors returned by [`FailoverManager::call`](crate::FailoverManager::call).
#[derive(Debug, Error)]
pub enum FailoverError<E> {
    /// Every candidate was short-circuited; no upstream was reached.
    #[error("all services down; no failover candidate accepted the call")]
    AllServicesDown,

    /// The chain was exhausted and fallback mode is enabled but no fallback
    /// value was supplied.
    #[error("fallback mode active but no fallback value available")]
    FallbackUnavailable,

    /// The last candidate that was actually reached returned this error.
    #[error("upstream error: {0}")]
    Inner(E),
}

impl<E> FailoverError<E> {
    /// Returns the upstream error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            FailoverError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
