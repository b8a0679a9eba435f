//! OnionMesh Client
//!
//! The sending and receiving side of the network:
//!
//! - `path`: distinct random relay selection from a directory snapshot
//! - `builder`: nested envelope construction for a chosen path
//! - `recipient`: decoding a delivered terminal payload
//! - `user`: the user node (send over HTTP, receive, debug accessors)

mod builder;
mod path;
pub mod recipient;
mod user;

pub use builder::{build_onion, Addressing, Onion, OnionBuilder};
pub use path::{PathSelector, SelectionPolicy};
pub use user::{user_router, OnionSender, User, UserNode, UserState};
