//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier is invalid, absolute, or escapes the collection root.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A name cannot be turned into a file name.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A required field is empty.
    #[error("field must not be empty: {0}")]
    EmptyField(String),

    /// A variable key appears more than once in the same scope.
    #[error("duplicate variable key: {0}")]
    DuplicateVariable(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
