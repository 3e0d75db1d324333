use thiserror::Error;

/// Errors produced by model validation routines.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("rating {0} is out of range (expected 1-10)")]
    RatingOutOfRange(u8),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
