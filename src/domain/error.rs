//! Domain error types

use crate::auth::AuthError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors returned by the domain managers
#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("An employee with cedula {0} already exists")]
    DuplicateCedula(String),

    #[error("A department named '{0}' already exists")]
    DuplicateDepartment(String),

    #[error("Department '{name}' cannot be deleted: {count} employee(s) still assigned")]
    DepartmentInUse { name: String, count: usize },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Record failed validation
    #[error("Invalid {kind}: {reason}")]
    Invalid { kind: &'static str, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Export error: {0}")]
    Export(String),
}

impl From<csv::Error> for DomainError {
    fn from(err: csv::Error) -> Self {
        DomainError::Export(err.to_string())
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
