//! Core types shared across the authorization kernel

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// A principal holding credentials and a set of scopes.
///
/// Clients also serve as issuers of temporary certificates. When a client's
/// effective scopes are expanded, the client is treated as owning the role
/// `client-id:<clientId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    #[serde(rename = "clientId")]
    pub client_id: String,

    /// Secret access token; keys certificate signatures for this issuer
    #[serde(rename = "accessToken")]
    pub access_token: String,

    /// Scopes granted directly to the client
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Client {
    pub fn new(
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
            scopes,
        }
    }
}

/// External collaborator that resolves a `clientId` to a [`Client`].
///
/// Implementations must be safe to call concurrently. A missing client is
/// signalled with [`AuthzError::NoSuchClient`]; its message is part of the
/// validator's external contract.
#[async_trait]
pub trait ClientLoader: Send + Sync {
    async fn load_client(&self, client_id: &str) -> Result<Client>;
}

/// In-memory [`ClientLoader`] backed by a `HashMap`, for tests and small
/// deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClientLoader {
    clients: HashMap<String, Client>,
}

impl InMemoryClientLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client, replacing any previous entry with the same id
    pub fn with_client(mut self, client: Client) -> Self {
        self.clients.insert(client.client_id.clone(), client);
        self
    }

    pub fn insert(&mut self, client: Client) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientLoader for InMemoryClientLoader {
    async fn load_client(&self, client_id: &str) -> Result<Client> {
        self.clients
            .get(client_id)
            .cloned()
            .ok_or(AuthzError::NoSuchClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_loader() {
        let loader = InMemoryClientLoader::new().with_client(Client::new(
            "worker",
            "secret-token",
            vec!["queue:*".to_string()],
        ));

        let client = loader.load_client("worker").await.unwrap();
        assert_eq!(client.client_id, "worker");
        assert_eq!(client.scopes, vec!["queue:*".to_string()]);

        let missing = loader.load_client("ghost").await.unwrap_err();
        assert_eq!(missing.to_string(), "no such clientId");
        assert!(matches!(missing, AuthzError::NoSuchClient));
    }
}
