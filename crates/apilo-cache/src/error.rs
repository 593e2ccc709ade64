use thiserror::Error;

/// Errors returned by cache operations.
///
/// `get` cannot fail; `set` fails only when the body alone exceeds the
/// configured byte cap.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The entry body is larger than the whole cache budget.
    #[error("item of {size} bytes exceeds cache capacity of {max_bytes} bytes")]
    ItemTooLarge { size: usize, max_bytes: u64 },
}
