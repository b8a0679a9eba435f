//! Onion layer construction and peeling
//!
//! Each layer is a JSON [`Layer`] encrypted under a fresh AES-256-GCM key,
//! with that key sealed under the target relay's RSA public key. A relay peels
//! exactly one layer and learns only the next hop address.

use tracing::debug;
use zeroize::Zeroizing;

use onionmesh_core::{Envelope, ForwardLayer, Layer, NodeId, OnionError, TerminalPayload};

use crate::encrypt::{decrypt_symmetric, encrypt_symmetric, SymmetricKey};
use crate::keys::{seal_symmetric_key, RelayKeypair, RelayPublicKey};

/// A relay on the sender's chosen path
#[derive(Debug, Clone)]
pub struct OnionHop {
    pub id: NodeId,
    pub public_key: RelayPublicKey,
    /// Receive endpoint the previous hop (or the sender) posts to
    pub address: String,
}

/// Encrypt one layer for one relay under a fresh symmetric key
pub fn seal_layer(public_key: &RelayPublicKey, layer: &Layer) -> Result<Envelope, OnionError> {
    let key = SymmetricKey::generate();
    let plaintext = Zeroizing::new(layer.to_bytes()?);

    let body = encrypt_symmetric(&key, &plaintext)?;
    let wrapped_key = seal_symmetric_key(public_key, key.as_bytes())?;

    Ok(Envelope::new(wrapped_key, body))
}

/// Build the nested envelope for `hops` (entry relay first).
///
/// Layers are built inside-out: the last relay's layer wraps the terminal
/// payload, and every outer layer wraps the envelope of the relay after it
/// together with that relay's address. The returned envelope is the one to
/// post to `hops[0].address`.
pub fn build_onion_layers(
    hops: &[OnionHop],
    recipient_address: &str,
    message: &[u8],
) -> Result<Envelope, OnionError> {
    let entry = hops.first().ok_or_else(|| {
        OnionError::Validation("onion path must contain at least one relay".to_string())
    })?;

    let mut inner = Layer::Terminal(TerminalPayload::new(recipient_address, message));

    for hop in hops.iter().skip(1).rev() {
        debug!("Wrapping layer for node {}", hop.id);
        let envelope = seal_layer(&hop.public_key, &inner)?;
        inner = Layer::Forward(ForwardLayer::new(hop.address.clone(), envelope));
    }

    debug!("Wrapping layer for entry node {}", entry.id);
    seal_layer(&entry.public_key, &inner)
}

/// Peel one layer with this relay's key pair.
///
/// Fails with `Protocol` when the envelope carries no sealed key (it is not
/// addressed to a relay), and with `Crypto` when unsealing or authentication
/// fails.
pub fn peel_layer(keypair: &RelayKeypair, envelope: &Envelope) -> Result<Layer, OnionError> {
    let wrapped_key = envelope.wrapped_key.as_deref().ok_or_else(|| {
        OnionError::Protocol("missing wrappedKey: envelope is not addressed to a relay".to_string())
    })?;

    let key_bytes = Zeroizing::new(keypair.unseal(wrapped_key)?);
    let key = SymmetricKey::from_bytes(&key_bytes)?;
    let plaintext = Zeroizing::new(decrypt_symmetric(&key, &envelope.body)?);

    Layer::from_bytes(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionmesh_core::encoding;

    fn make_hops(count: u32) -> Vec<(OnionHop, RelayKeypair)> {
        (1..=count)
            .map(|id| {
                let keypair = RelayKeypair::generate().unwrap();
                let hop = OnionHop {
                    id,
                    public_key: keypair.public_key().clone(),
                    address: format!("relay://{}/receive", id),
                };
                (hop, keypair)
            })
            .collect()
    }

    #[test]
    fn test_onion_1_hop() {
        let relays = make_hops(1);
        let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();

        let envelope = build_onion_layers(&hops, "deliver://user1", b"ping").unwrap();
        let layer = peel_layer(&relays[0].1, &envelope).unwrap();

        match layer {
            Layer::Terminal(payload) => {
                assert_eq!(payload.destination, "deliver://user1");
                assert_eq!(payload.decode_data().unwrap(), b"ping");
            }
            Layer::Forward(_) => panic!("single hop must reveal the terminal payload"),
        }
    }

    #[test]
    fn test_onion_3_hops() {
        let relays = make_hops(3);
        let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();

        let envelope = build_onion_layers(&hops, "deliver://user42", b"hello").unwrap();

        let l1 = peel_layer(&relays[0].1, &envelope).unwrap();
        let Layer::Forward(l1) = l1 else { panic!("relay 1 must forward") };
        assert_eq!(l1.next_hop_address, "relay://2/receive");
        let (_, e2) = l1.into_parts();
        assert!(e2.body.len() < envelope.body.len());

        let l2 = peel_layer(&relays[1].1, &e2).unwrap();
        let Layer::Forward(l2) = l2 else { panic!("relay 2 must forward") };
        assert_eq!(l2.next_hop_address, "relay://3/receive");
        let (_, e3) = l2.into_parts();

        let l3 = peel_layer(&relays[2].1, &e3).unwrap();
        let Layer::Terminal(payload) = l3 else { panic!("relay 3 must be terminal") };
        assert_eq!(payload.destination, "deliver://user42");
        assert_eq!(payload.data, encoding::encode(b"hello"));
        assert_eq!(payload.decode_data().unwrap(), b"hello");
    }

    #[test]
    fn test_layer_count_matches_path_length() {
        for length in 1..=4 {
            let relays = make_hops(length);
            let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();
            let mut envelope = build_onion_layers(&hops, "deliver://x", b"m").unwrap();

            let mut keyed_layers = 0;
            for (_, keypair) in &relays {
                assert!(envelope.wrapped_key.is_some());
                keyed_layers += 1;
                match peel_layer(keypair, &envelope).unwrap() {
                    Layer::Forward(forward) => envelope = forward.into_parts().1,
                    Layer::Terminal(_) => break,
                }
            }
            assert_eq!(keyed_layers, length);
        }
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = build_onion_layers(&[], "deliver://x", b"m");
        assert!(matches!(result, Err(OnionError::Validation(_))));
    }

    #[test]
    fn test_wrong_key_cannot_peel() {
        let relays = make_hops(2);
        let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();
        let envelope = build_onion_layers(&hops, "deliver://x", b"m").unwrap();

        // Out of order: relay 2 receives relay 1's layer
        let result = peel_layer(&relays[1].1, &envelope);
        assert!(matches!(result, Err(OnionError::Crypto(_))));
    }

    #[test]
    fn test_missing_wrapped_key_is_protocol_error() {
        let relays = make_hops(1);
        let envelope = Envelope {
            wrapped_key: None,
            body: vec![0u8; 64],
        };

        let result = peel_layer(&relays[0].1, &envelope);
        assert!(matches!(result, Err(OnionError::Protocol(_))));
    }

    #[test]
    fn test_tampered_body_is_crypto_error() {
        let relays = make_hops(1);
        let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();
        let mut envelope = build_onion_layers(&hops, "deliver://x", b"m").unwrap();
        let last = envelope.body.len() - 1;
        envelope.body[last] ^= 0xFF;

        let result = peel_layer(&relays[0].1, &envelope);
        assert!(matches!(result, Err(OnionError::Crypto(_))));
    }

    #[test]
    fn test_sealed_key_that_is_not_32_bytes_is_crypto_error() {
        let relays = make_hops(1);
        let wrapped_key = seal_symmetric_key(relays[0].1.public_key(), &[1u8; 16]).unwrap();
        let envelope = Envelope::new(wrapped_key, vec![0u8; 40]);

        let result = peel_layer(&relays[0].1, &envelope);
        assert!(matches!(result, Err(OnionError::Crypto(_))));
    }

    #[test]
    fn test_repeated_builds_differ() {
        let relays = make_hops(1);
        let hops: Vec<OnionHop> = relays.iter().map(|(h, _)| h.clone()).collect();

        let a = build_onion_layers(&hops, "deliver://x", b"same").unwrap();
        let b = build_onion_layers(&hops, "deliver://x", b"same").unwrap();
        assert_ne!(a.body, b.body);
        assert_ne!(a.wrapped_key, b.wrapped_key);
    }
}
