// ABOUTME: Registered client lookups for the authorize endpoint
// ABOUTME: Per-request snapshots so one request sees one consistent client view
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::database::AuthStore;
use crate::models::{ClientApplication, ClientType};
use anyhow::Result;
use std::sync::Arc;

/// Consistent view of one client, read once per request
///
/// Registration data is read exactly once at the start of a request and every
/// later check uses this snapshot, so a concurrent deactivation cannot make a
/// single request see two different client states.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// The registered client
    pub client: ClientApplication,
    /// Active registered redirect URIs
    pub redirect_uris: Vec<String>,
}

impl ClientSnapshot {
    /// The client's confidentiality class
    #[must_use]
    pub const fn client_type(&self) -> ClientType {
        self.client.client_type
    }
}

/// Read-facade over client registrations
pub struct ClientRegistry {
    store: Arc<dyn AuthStore>,
}

impl ClientRegistry {
    /// Create a registry over the injected store
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Load a snapshot of an active client and its active redirect URIs
    ///
    /// Returns `None` for unknown client ids and for deactivated clients;
    /// callers treat both identically so probing cannot distinguish them.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn snapshot(&self, client_id: &str) -> Result<Option<ClientSnapshot>> {
        let Some(client) = self.store.get_client_by_client_id(client_id).await? else {
            return Ok(None);
        };
        if !client.is_active {
            return Ok(None);
        }

        let redirect_uris = self
            .store
            .list_redirect_uris(client_id)
            .await?
            .into_iter()
            .filter(|uri| uri.is_active)
            .map(|uri| uri.uri)
            .collect();

        Ok(Some(ClientSnapshot {
            client,
            redirect_uris,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryStore;
    use crate::models::RegisteredRedirectUri;

    fn client(client_id: &str, is_active: bool) -> ClientApplication {
        ClientApplication {
            client_id: client_id.to_owned(),
            client_type: ClientType::Public,
            is_active,
        }
    }

    fn uri(value: &str, is_active: bool) -> RegisteredRedirectUri {
        RegisteredRedirectUri {
            uri: value.to_owned(),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_look_identical() {
        let store = Arc::new(InMemoryStore::new());
        store.register_client(
            client("dormant", false),
            vec![uri("https://app.example.com/cb", true)],
        );

        let registry = ClientRegistry::new(store);
        assert!(registry.snapshot("nope").await.unwrap().is_none());
        assert!(registry.snapshot("dormant").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_filters_inactive_redirect_uris() {
        let store = Arc::new(InMemoryStore::new());
        store.register_client(
            client("client-1", true),
            vec![
                uri("https://app.example.com/cb", false),
                uri("https://app.example.com/cb2", true),
            ],
        );

        let registry = ClientRegistry::new(store);
        let snapshot = registry.snapshot("client-1").await.unwrap().unwrap();
        assert_eq!(snapshot.redirect_uris, vec!["https://app.example.com/cb2"]);
        assert_eq!(snapshot.client_type(), ClientType::Public);
    }
}
