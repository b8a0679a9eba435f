use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::{OnionError, Result};

/// Relay (and user) identifier
pub type NodeId = u32;

/// One onion layer as it travels to a relay's receive endpoint.
///
/// The address it was posted to is implicit in the URL, so the wire form
/// carries only the sealed key and the encrypted body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Per-hop symmetric key sealed under the receiving relay's public key
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "encoding::base64_opt"
    )]
    pub wrapped_key: Option<Vec<u8>>,
    /// `nonce || ciphertext || tag` of the serialized inner [`Layer`]
    #[serde(with = "encoding::base64_bytes")]
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(wrapped_key: Vec<u8>, body: Vec<u8>) -> Self {
        Self {
            wrapped_key: Some(wrapped_key),
            body,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| OnionError::Validation(format!("envelope encode failed: {}", e)))
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| OnionError::Validation(format!("malformed envelope: {}", e)))
    }
}

/// A relay-bound layer, revealed after the previous hop peels its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardLayer {
    /// Receive endpoint of the relay that owns `envelope`
    pub next_hop_address: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "encoding::base64_opt"
    )]
    pub wrapped_key: Option<Vec<u8>>,
    #[serde(with = "encoding::base64_bytes")]
    pub body: Vec<u8>,
}

impl ForwardLayer {
    pub fn new(next_hop_address: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            next_hop_address: next_hop_address.into(),
            wrapped_key: envelope.wrapped_key,
            body: envelope.body,
        }
    }

    /// Split into the delivery address and the envelope to post there
    pub fn into_parts(self) -> (String, Envelope) {
        (
            self.next_hop_address,
            Envelope {
                wrapped_key: self.wrapped_key,
                body: self.body,
            },
        )
    }
}

/// Innermost payload, delivered to the recipient with zero layers left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalPayload {
    /// Recipient deliver endpoint
    #[serde(default)]
    pub destination: String,
    /// Base64 of the message bytes
    pub data: String,
}

impl TerminalPayload {
    pub fn new(destination: impl Into<String>, message: &[u8]) -> Self {
        Self {
            destination: destination.into(),
            data: encoding::encode(message),
        }
    }

    /// Decode `data` back to the original message bytes
    pub fn decode_data(&self) -> Result<Vec<u8>> {
        encoding::decode(&self.data)
    }
}

/// The plaintext a relay recovers from an envelope body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Layer {
    /// Another relay follows
    Forward(ForwardLayer),
    /// This relay is the last hop
    Terminal(TerminalPayload),
}

impl Layer {
    /// Address this layer must be delivered to
    pub fn next_hop_address(&self) -> &str {
        match self {
            Layer::Forward(layer) => &layer.next_hop_address,
            Layer::Terminal(payload) => &payload.destination,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Layer::Terminal(_))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| OnionError::Validation(format!("layer encode failed: {}", e)))
    }

    /// Parse a decrypted layer. A body that authenticates but does not parse
    /// is an out-of-order or malformed envelope.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| OnionError::Protocol(format!("malformed inner layer: {}", e)))
    }
}

/// Directory entry as exchanged with the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    /// Base64 SPKI DER of the relay's RSA public key
    pub public_key: String,
}

/// `GET /getRegistry` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryListing {
    pub nodes: Vec<NodeRecord>,
}

/// `POST /sendMessage` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub message: String,
    pub destination_user_id: NodeId,
}

/// Generic `{ success }` acknowledgement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Generic `{ error }` failure response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl From<&OnionError> for ErrorBody {
    fn from(err: &OnionError) -> Self {
        Self {
            error: err.to_string(),
            kind: Some(err.kind().to_string()),
        }
    }
}

/// Generic `{ result }` wrapper used by the debug accessors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: T,
}

/// Transient per-relay diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub received: u64,
    pub forwarded: u64,
    pub failed: u64,
}
