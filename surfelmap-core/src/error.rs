//! Error types for surfelmap

use thiserror::Error;

/// Main error type for surfelmap operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for surfelmap operations
pub type Result<T> = std::result::Result<T, Error>;
