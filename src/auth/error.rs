//! Authentication error types

use crate::storage::StorageError;
use thiserror::Error;

/// Errors returned by the session reconciler and identity providers
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credential rejected before reaching a provider
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Provider rejected the sign-in
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Provider could not be reached or is not configured
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Authenticated, but lacking a permission
    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::ProviderUnavailable(err.to_string())
    }
}

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
