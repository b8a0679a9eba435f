//! Relay path selection
//!
//! Paths are drawn from a directory snapshot. Relays in one path are always
//! distinct, so no relay peels two layers of the same message.

use rand::seq::SliceRandom;
use rand::Rng;

use onionmesh_core::{OnionError, Result};
use onionmesh_registry::RelayIdentity;

/// How relays are drawn from the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Uniformly random, distinct relays
    #[default]
    Random,
    /// The first relays in registration order (deterministic)
    Ordered,
}

/// Path selection utilities
pub struct PathSelector;

impl PathSelector {
    /// Select `path_length` distinct relays, entry relay first
    pub fn select(
        snapshot: &[RelayIdentity],
        path_length: usize,
        policy: SelectionPolicy,
    ) -> Result<Vec<RelayIdentity>> {
        Self::select_with_rng(snapshot, path_length, policy, &mut rand::thread_rng())
    }

    pub fn select_with_rng<R: Rng + ?Sized>(
        snapshot: &[RelayIdentity],
        path_length: usize,
        policy: SelectionPolicy,
        rng: &mut R,
    ) -> Result<Vec<RelayIdentity>> {
        if path_length == 0 {
            return Err(OnionError::Validation(
                "path length must be at least 1".to_string(),
            ));
        }

        if snapshot.len() < path_length {
            return Err(OnionError::InsufficientRelays {
                required: path_length,
                available: snapshot.len(),
            });
        }

        let path = match policy {
            SelectionPolicy::Random => {
                let mut candidates = snapshot.to_vec();
                candidates.shuffle(rng);
                candidates.truncate(path_length);
                candidates
            }
            SelectionPolicy::Ordered => snapshot[..path_length].to_vec(),
        };

        Ok(path)
    }
}
