//! Error types for the authorization core

use thiserror::Error;

use crate::scope::ScopeError;

/// Authorization core errors
///
/// Authentication failures are not errors: the validator reports them as
/// [`crate::auth::Authentication::Failed`] values with stable messages.
/// This enum covers invalid inputs and programmer bugs.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid scope string
    #[error("Invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    /// Invalid role definition
    #[error("Invalid role `{role_id}`: {reason}")]
    InvalidRole { role_id: String, reason: ScopeError },

    /// Client lookup failed; the message is part of the external contract
    #[error("no such clientId")]
    NoSuchClient,

    /// Invalid parameters for temporary-credential minting
    #[error("Invalid temporary credentials: {0}")]
    InvalidTemporaryCredentials(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
