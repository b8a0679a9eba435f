//! OnionMesh Relay
//!
//! Onion relay logic: peels exactly one encrypted layer per hop to learn the
//! next hop address, then makes a single delivery attempt to it. The relay
//! never sees more of the path than its neighbours.

mod handler;
mod server;
mod transport;

pub use handler::{RelayDiagnostics, RelayHandler};
pub use server::{relay_router, RelayNode};
pub use transport::{Delivery, HttpTransport, MemoryTransport, Transport};
