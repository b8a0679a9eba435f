//! Relay hop processing

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use onionmesh_core::{encoding, Envelope, NodeId, RelayStats, Result};
use onionmesh_crypto::{peel_layer, RelayKeypair, RelayPublicKey};

use crate::transport::{Delivery, Transport};

/// What the relay last saw, for the debug routes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayDiagnostics {
    /// Base64 body of the last envelope received
    pub last_encrypted: Option<String>,
    /// JSON of the last layer recovered
    pub last_decrypted: Option<String>,
    /// Where the last recovered layer was sent
    pub last_destination: Option<String>,
    pub stats: RelayStats,
}

/// Peels one layer per envelope and forwards the rest.
///
/// The key pair is read-only and shared; diagnostics are the only mutable
/// state and are never consulted by the hop logic itself.
pub struct RelayHandler {
    node_id: NodeId,
    keypair: Arc<RelayKeypair>,
    transport: Arc<dyn Transport>,
    diagnostics: Mutex<RelayDiagnostics>,
}

impl RelayHandler {
    pub fn new(node_id: NodeId, keypair: Arc<RelayKeypair>, transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id,
            keypair,
            transport,
            diagnostics: Mutex::new(RelayDiagnostics::default()),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> &RelayPublicKey {
        self.keypair.public_key()
    }

    /// Unseal and decrypt one layer, returning where it goes and what to send
    pub fn peel(&self, envelope: &Envelope) -> Result<(String, Delivery)> {
        self.diagnostics.lock().last_encrypted = Some(encoding::encode(&envelope.body));

        let layer = peel_layer(&self.keypair, envelope)?;
        let decrypted = String::from_utf8_lossy(&layer.to_bytes()?).into_owned();
        let (address, delivery) = Delivery::from_layer(layer);

        {
            let mut diagnostics = self.diagnostics.lock();
            diagnostics.last_decrypted = Some(decrypted);
            diagnostics.last_destination = Some(address.clone());
        }

        Ok((address, delivery))
    }

    /// Full hop: peel, then a single delivery attempt. No retry.
    pub async fn handle(&self, envelope: Envelope) -> Result<()> {
        self.diagnostics.lock().stats.received += 1;
        debug!(
            "Node {} received envelope, body {}",
            self.node_id,
            encoding::preview(&envelope.body)
        );

        let result = self.peel_and_forward(&envelope).await;

        let mut diagnostics = self.diagnostics.lock();
        match &result {
            Ok(()) => diagnostics.stats.forwarded += 1,
            Err(e) => {
                diagnostics.stats.failed += 1;
                warn!("Node {} dropped envelope: {}", self.node_id, e);
            }
        }

        result
    }

    async fn peel_and_forward(&self, envelope: &Envelope) -> Result<()> {
        let (address, delivery) = self.peel(envelope)?;
        if delivery.is_terminal() {
            info!("Node {} delivering to recipient {}", self.node_id, address);
        } else {
            info!("Node {} forwarding to {}", self.node_id, address);
        }
        self.transport.deliver(&address, &delivery).await
    }

    pub fn diagnostics(&self) -> RelayDiagnostics {
        self.diagnostics.lock().clone()
    }

    pub fn stats(&self) -> RelayStats {
        self.diagnostics.lock().stats
    }
}
