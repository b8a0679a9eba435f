//! In-memory relay directory

use parking_lot::RwLock;
use tracing::{debug, info};

use onionmesh_core::{NodeId, NodeRecord, OnionError, RegistryListing, Result};
use onionmesh_crypto::RelayPublicKey;

/// A registered relay: its id and RSA public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayIdentity {
    pub id: NodeId,
    pub public_key: RelayPublicKey,
}

impl RelayIdentity {
    pub fn new(id: NodeId, public_key: RelayPublicKey) -> Self {
        Self { id, public_key }
    }

    /// Parse a wire record, validating the exported key
    pub fn from_record(record: &NodeRecord) -> Result<Self> {
        let public_key = RelayPublicKey::from_base64(&record.public_key)?;
        Ok(Self::new(record.id, public_key))
    }

    /// Export to the wire record form
    pub fn to_record(&self) -> Result<NodeRecord> {
        Ok(NodeRecord {
            id: self.id,
            public_key: self.public_key.to_base64()?,
        })
    }
}

/// Insertion-ordered set of relay identities, unique by id.
///
/// `register` and `snapshot` serialize on a single lock, so a snapshot never
/// observes a half-applied registration. Readers always get a copy.
#[derive(Default)]
pub struct Directory {
    nodes: RwLock<Vec<RelayIdentity>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relay from its exported public key text.
    ///
    /// Returns `Ok(true)` if the relay was added, `Ok(false)` if the id was
    /// already present (the first registration wins). Fails with
    /// `Validation` when the key text is not a well-formed RSA public key.
    pub fn register(&self, id: NodeId, public_key_text: &str) -> Result<bool> {
        let public_key = RelayPublicKey::from_base64(public_key_text)
            .map_err(|e| OnionError::Validation(format!("node {}: {}", id, e)))?;
        Ok(self.register_identity(RelayIdentity::new(id, public_key)))
    }

    /// Register an already-parsed identity; same first-wins semantics
    pub fn register_identity(&self, identity: RelayIdentity) -> bool {
        let mut nodes = self.nodes.write();
        if nodes.iter().any(|n| n.id == identity.id) {
            debug!("Node {} already registered, ignoring", identity.id);
            return false;
        }
        info!(
            "Registered node {} (key {})",
            identity.id,
            identity.public_key.fingerprint()
        );
        nodes.push(identity);
        true
    }

    /// Copy of the current membership in registration order
    pub fn snapshot(&self) -> Vec<RelayIdentity> {
        self.nodes.read().clone()
    }

    /// Look up one relay by id
    pub fn get(&self, id: NodeId) -> Option<RelayIdentity> {
        self.nodes.read().iter().find(|n| n.id == id).cloned()
    }

    /// Wire listing for `GET /getRegistry`
    pub fn listing(&self) -> Result<RegistryListing> {
        let nodes = self
            .snapshot()
            .iter()
            .map(RelayIdentity::to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(RegistryListing { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
