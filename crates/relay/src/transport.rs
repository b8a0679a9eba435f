//! Outbound delivery of peeled layers

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use onionmesh_core::{Envelope, Layer, OnionError, Result, TerminalPayload};

/// What a relay sends after peeling its layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Delivery {
    /// Next relay's envelope, posted to its receive endpoint
    Hop(Envelope),
    /// Plaintext-encoded payload, posted to the recipient's deliver endpoint
    Terminal(TerminalPayload),
}

impl Delivery {
    /// Split a peeled layer into its destination and outbound body
    pub fn from_layer(layer: Layer) -> (String, Self) {
        match layer {
            Layer::Forward(forward) => {
                let (address, envelope) = forward.into_parts();
                (address, Delivery::Hop(envelope))
            }
            Layer::Terminal(payload) => (payload.destination.clone(), Delivery::Terminal(payload)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Delivery::Terminal(_))
    }
}

/// A single, unretried delivery attempt
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, address: &str, delivery: &Delivery) -> Result<()>;
}

/// JSON over HTTP POST
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OnionError::Delivery(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST `body` as JSON; any transport failure or non-2xx is `Delivery`
    pub async fn post_json<T: Serialize + ?Sized>(&self, address: &str, body: &T) -> Result<()> {
        let response = self
            .client
            .post(address)
            .json(body)
            .send()
            .await
            .map_err(|e| OnionError::Delivery(format!("{}: {}", address, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OnionError::Delivery(format!(
                "{} answered {}: {}",
                address, status, detail
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, address: &str, delivery: &Delivery) -> Result<()> {
        debug!("POST {} ({})", address, if delivery.is_terminal() { "terminal" } else { "hop" });
        self.post_json(address, delivery).await
    }
}

/// Records deliveries instead of sending them.
///
/// Used by simulations and tests that pump a whole circuit in one process.
/// Addresses marked unreachable fail with `Delivery`.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: Mutex<Vec<(String, Delivery)>>,
    unreachable: Mutex<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, address: impl Into<String>) {
        self.unreachable.lock().insert(address.into());
    }

    /// Remove and return everything delivered so far, oldest first
    pub fn drain(&self) -> Vec<(String, Delivery)> {
        std::mem::take(&mut *self.outbox.lock())
    }

    /// Remove and return the oldest delivery
    pub fn pop(&self) -> Option<(String, Delivery)> {
        let mut outbox = self.outbox.lock();
        if outbox.is_empty() {
            None
        } else {
            Some(outbox.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.lock().is_empty()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn deliver(&self, address: &str, delivery: &Delivery) -> Result<()> {
        if self.unreachable.lock().contains(address) {
            return Err(OnionError::Delivery(format!("{}: unreachable", address)));
        }
        self.outbox
            .lock()
            .push((address.to_string(), delivery.clone()));
        Ok(())
    }
}
