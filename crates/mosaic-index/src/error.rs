//! Error types for index access.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Index does not support sorting (requested sort on '{0}')")]
    SortingNotSupported(String),

    #[error("Invalid index query: {0}")]
    InvalidQuery(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
