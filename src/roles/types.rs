//! Role type definitions

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::scope::validate_scope;

/// A role: a bundle of scopes granted to any principal holding a scope
/// that covers the role's activation pattern `assume:<roleId>`.
///
/// A `roleId` ending in `*` activates on any `assume:` scope whose tail
/// starts with the characters before the `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier; scope-like, wildcard permitted as final character
    #[serde(rename = "roleId")]
    pub role_id: String,

    /// Scopes granted by this role, possibly including further
    /// `assume:<roleId>` scopes
    pub scopes: Vec<String>,
}

impl Role {
    pub fn new(role_id: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            role_id: role_id.into(),
            scopes,
        }
    }

    /// The scope that triggers this role
    pub fn activation(&self) -> String {
        format!("assume:{}", self.role_id)
    }

    /// Validates the role definition: the `roleId` and every scope must be
    /// well-formed scope strings.
    pub fn validate(&self) -> Result<()> {
        validate_scope(&self.role_id).map_err(|reason| AuthzError::InvalidRole {
            role_id: self.role_id.clone(),
            reason,
        })?;

        for scope in &self.scopes {
            validate_scope(scope).map_err(|reason| AuthzError::InvalidRole {
                role_id: self.role_id.clone(),
                reason,
            })?;
        }

        Ok(())
    }
}

/// A role whose scope set is the fixed-point expansion: the union of its
/// own scopes and the scopes of every role transitively activated by any
/// of them. The set is normalized and closed: expanding any member again
/// yields nothing new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedRole {
    /// Role identifier
    pub role_id: String,

    /// `assume:<roleId>`, precomputed for DFA construction
    pub activation: String,

    /// Fixed-point scope set, in normal form
    pub scopes: Vec<String>,
}
