//! OnionMesh Node Directory
//!
//! The flat directory of relay identities and public keys, the HTTP registry
//! that serves it, and the client relays and senders use to reach it.
//!
//! ## Routes
//!
//! - `GET /status` - liveness
//! - `POST /registerNode` - `{ id, publicKey }`, idempotent
//! - `GET /getRegistry` - `{ nodes: [{ id, publicKey }] }`

mod client;
mod directory;
pub mod http;
mod server;

pub use client::RegistryClient;
pub use directory::{Directory, RelayIdentity};
pub use http::{ServeError, ServerHandle};
pub use server::{registry_router, RegistryServer};
