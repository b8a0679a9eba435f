//! HTTP client for the registry

use std::time::Duration;

use tracing::{debug, warn};

use onionmesh_core::config::routes;
use onionmesh_core::{NodeId, NodeRecord, OnionError, RegistryListing, Result};
use onionmesh_crypto::RelayPublicKey;

use crate::directory::RelayIdentity;

/// Talks to a running registry over HTTP
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OnionError::Delivery(format!("http client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Announce a relay identity
    pub async fn register(&self, id: NodeId, public_key: &RelayPublicKey) -> Result<()> {
        let record = NodeRecord {
            id,
            public_key: public_key.to_base64()?,
        };
        let url = format!("{}{}", self.base_url, routes::REGISTER_NODE);

        let response = self
            .client
            .post(&url)
            .json(&record)
            .send()
            .await
            .map_err(|e| OnionError::Delivery(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OnionError::Delivery(format!(
                "registry rejected node {}: {} {}",
                id, status, body
            )));
        }

        debug!("Registered node {} with {}", id, self.base_url);
        Ok(())
    }

    /// Raw directory listing
    pub async fn fetch_records(&self) -> Result<Vec<NodeRecord>> {
        let url = format!("{}{}", self.base_url, routes::GET_REGISTRY);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OnionError::Delivery(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(OnionError::Delivery(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }

        let listing: RegistryListing = response
            .json()
            .await
            .map_err(|e| OnionError::Validation(format!("registry listing: {}", e)))?;
        Ok(listing.nodes)
    }

    /// Directory snapshot with parsed keys; entries whose key fails to
    /// import are skipped.
    pub async fn snapshot(&self) -> Result<Vec<RelayIdentity>> {
        let records = self.fetch_records().await?;
        let mut identities = Vec::with_capacity(records.len());

        for record in &records {
            match RelayIdentity::from_record(record) {
                Ok(identity) => identities.push(identity),
                Err(e) => warn!("Skipping registry entry {}: {}", record.id, e),
            }
        }

        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::RegistryServer;
    use onionmesh_crypto::RelayKeypair;

    #[tokio::test]
    async fn test_register_then_snapshot() {
        let server = RegistryServer::new();
        let handle = server.start("127.0.0.1:0").await.unwrap();
        let client = RegistryClient::new(
            format!("http://{}/", handle.local_addr()),
            Duration::from_secs(5),
        )
        .unwrap();

        let a = RelayKeypair::generate().unwrap();
        let b = RelayKeypair::generate().unwrap();
        client.register(1, a.public_key()).await.unwrap();
        client.register(2, b.public_key()).await.unwrap();
        // Duplicate id is accepted but ignored
        client.register(1, b.public_key()).await.unwrap();

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, 1);
        assert_eq!(&snapshot[0].public_key, a.public_key());
        assert_eq!(&snapshot[1].public_key, b.public_key());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_delivery_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            RegistryClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let result = client.fetch_records().await;
        assert!(matches!(result, Err(OnionError::Delivery(_))));
    }
}
