//! Onion construction for a sender

use tracing::{debug, info};

use onionmesh_core::{Envelope, NodeId, Result};
use onionmesh_crypto::{build_onion_layers, OnionHop};
use onionmesh_registry::RelayIdentity;
use onionmesh_settings::NetworkSettings;

use crate::path::{PathSelector, SelectionPolicy};

/// Maps a relay id to the receive endpoint other hops post to
pub trait Addressing {
    fn relay_address(&self, id: NodeId) -> String;
}

impl Addressing for NetworkSettings {
    fn relay_address(&self, id: NodeId) -> String {
        self.relay_receive_url(id)
    }
}

impl<F> Addressing for F
where
    F: Fn(NodeId) -> String,
{
    fn relay_address(&self, id: NodeId) -> String {
        self(id)
    }
}

/// A built onion, ready to post to its entry relay
#[derive(Debug, Clone)]
pub struct Onion {
    pub entry_address: String,
    pub envelope: Envelope,
    /// Relay ids in path order, entry first
    pub circuit: Vec<NodeId>,
}

/// Selects a path and wraps a message for it
pub struct OnionBuilder<'a, A: Addressing + ?Sized> {
    addressing: &'a A,
    path_length: usize,
    policy: SelectionPolicy,
}

impl<'a, A: Addressing + ?Sized> OnionBuilder<'a, A> {
    pub fn new(addressing: &'a A, path_length: usize) -> Self {
        Self {
            addressing,
            path_length,
            policy: SelectionPolicy::Random,
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pick a path from `snapshot` and wrap `message` for `recipient_address`
    pub fn build(
        &self,
        message: &[u8],
        recipient_address: &str,
        snapshot: &[RelayIdentity],
    ) -> Result<Onion> {
        let path = PathSelector::select(snapshot, self.path_length, self.policy)?;
        self.build_for_path(message, recipient_address, &path)
    }

    /// Wrap `message` for an already chosen path
    pub fn build_for_path(
        &self,
        message: &[u8],
        recipient_address: &str,
        path: &[RelayIdentity],
    ) -> Result<Onion> {
        let hops: Vec<OnionHop> = path
            .iter()
            .map(|relay| OnionHop {
                id: relay.id,
                public_key: relay.public_key.clone(),
                address: self.addressing.relay_address(relay.id),
            })
            .collect();
        let circuit: Vec<NodeId> = hops.iter().map(|h| h.id).collect();
        info!("Selected nodes for path: {:?}", circuit);

        let envelope = build_onion_layers(&hops, recipient_address, message)?;
        // build_onion_layers rejects an empty path, so hops[0] exists
        let entry_address = hops[0].address.clone();
        debug!(
            "Built {}-layer onion for {} ({} byte body)",
            hops.len(),
            recipient_address,
            envelope.body.len()
        );

        Ok(Onion {
            entry_address,
            envelope,
            circuit,
        })
    }
}

/// Select `path_length` random distinct relays and wrap `message` for them
pub fn build_onion<A: Addressing + ?Sized>(
    message: &[u8],
    recipient_address: &str,
    snapshot: &[RelayIdentity],
    path_length: usize,
    addressing: &A,
) -> Result<Onion> {
    OnionBuilder::new(addressing, path_length).build(message, recipient_address, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionmesh_core::{Layer, OnionError};
    use onionmesh_crypto::{peel_layer, RelayKeypair};

    fn relays(count: u32) -> Vec<(RelayIdentity, RelayKeypair)> {
        (1..=count)
            .map(|id| {
                let keypair = RelayKeypair::generate().unwrap();
                (RelayIdentity::new(id, keypair.public_key().clone()), keypair)
            })
            .collect()
    }

    fn address(id: NodeId) -> String {
        format!("relay://{}/receive", id)
    }

    #[test]
    fn test_concrete_three_relay_scenario() {
        let relays = relays(3);
        let snapshot: Vec<RelayIdentity> = relays.iter().map(|(r, _)| r.clone()).collect();

        let onion = OnionBuilder::new(&address, 3)
            .with_policy(SelectionPolicy::Ordered)
            .build(b"hello", "deliver://user42", &snapshot)
            .unwrap();
        assert_eq!(onion.entry_address, "relay://1/receive");
        assert_eq!(onion.circuit, vec![1, 2, 3]);

        let Layer::Forward(l1) = peel_layer(&relays[0].1, &onion.envelope).unwrap() else {
            panic!("relay 1 must see a forward layer");
        };
        assert_eq!(l1.next_hop_address, "relay://2/receive");

        let Layer::Forward(l2) = peel_layer(&relays[1].1, &l1.into_parts().1).unwrap() else {
            panic!("relay 2 must see a forward layer");
        };
        assert_eq!(l2.next_hop_address, "relay://3/receive");

        let Layer::Terminal(payload) = peel_layer(&relays[2].1, &l2.into_parts().1).unwrap()
        else {
            panic!("relay 3 must see the terminal payload");
        };
        assert_eq!(payload.destination, "deliver://user42");
        assert_eq!(payload.data, "aGVsbG8=");
        assert_eq!(payload.decode_data().unwrap(), b"hello");
    }

    #[test]
    fn test_random_build_round_trips() {
        let relays = relays(6);
        let snapshot: Vec<RelayIdentity> = relays.iter().map(|(r, _)| r.clone()).collect();

        let onion = build_onion(b"round trip", "deliver://u", &snapshot, 3, &address).unwrap();
        assert_eq!(onion.circuit.len(), 3);
        assert_eq!(onion.entry_address, address(onion.circuit[0]));

        let mut envelope = onion.envelope;
        for (i, id) in onion.circuit.iter().enumerate() {
            let keypair = &relays[(*id - 1) as usize].1;
            match peel_layer(keypair, &envelope).unwrap() {
                Layer::Forward(forward) => {
                    assert_eq!(forward.next_hop_address, address(onion.circuit[i + 1]));
                    envelope = forward.into_parts().1;
                }
                Layer::Terminal(payload) => {
                    assert_eq!(i, 2);
                    assert_eq!(payload.decode_data().unwrap(), b"round trip");
                }
            }
        }
    }

    #[test]
    fn test_build_with_too_few_relays() {
        let relays = relays(2);
        let snapshot: Vec<RelayIdentity> = relays.iter().map(|(r, _)| r.clone()).collect();

        let result = build_onion(b"m", "deliver://u", &snapshot, 3, &address);
        assert!(matches!(
            result,
            Err(OnionError::InsufficientRelays {
                required: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_network_settings_addressing() {
        let network = NetworkSettings::default();
        assert_eq!(network.relay_address(3), "http://localhost:4003/receive");

        let relays = relays(1);
        let snapshot = vec![relays[0].0.clone()];
        let onion = build_onion(b"m", "deliver://u", &snapshot, 1, &network).unwrap();
        assert_eq!(onion.entry_address, "http://localhost:4001/receive");
    }
}
