use thiserror::Error;

/// Store-level failure surfaced by the repository contracts.
///
/// `Duplicate` is its own variant because unique-key violations carry domain
/// meaning (a tag UID being re-registered); everything else stays opaque to
/// callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique column {0}")]
    Duplicate(&'static str),

    #[error("entity not found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
