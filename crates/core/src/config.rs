//! Protocol constants
//!
//! Fixed for every deployment, never negotiated at runtime. Ports and
//! hosts are defaults only; `onionmesh-settings` can override them.

/// Number of relays in a circuit
pub const DEFAULT_PATH_LENGTH: usize = 3;

/// RSA modulus size for relay key pairs
pub const RSA_KEY_BITS: u32 = 2048;

/// AES-256 key length in bytes
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Default host every component binds and is addressed on
pub const DEFAULT_HOST: &str = "localhost";

/// Registry listen port
pub const REGISTRY_PORT: u16 = 8080;

/// Relay `n` listens on `BASE_ONION_ROUTER_PORT + n`
pub const BASE_ONION_ROUTER_PORT: u16 = 4000;

/// User `n` listens on `BASE_USER_PORT + n`
pub const BASE_USER_PORT: u16 = 3000;

/// HTTP route paths
pub mod routes {
    pub const STATUS: &str = "/status";

    pub const REGISTER_NODE: &str = "/registerNode";
    pub const GET_REGISTRY: &str = "/getRegistry";

    pub const RECEIVE: &str = "/receive";
    pub const LAST_ENCRYPTED: &str = "/getLastReceivedEncryptedMessage";
    pub const LAST_DECRYPTED: &str = "/getLastReceivedDecryptedMessage";
    pub const LAST_DESTINATION: &str = "/getLastMessageDestination";
    pub const STATS: &str = "/stats";

    pub const SEND_MESSAGE: &str = "/sendMessage";
    pub const RECEIVE_MESSAGE: &str = "/receiveMessage";
    pub const LAST_RECEIVED_MESSAGE: &str = "/getLastReceivedMessage";
    pub const LAST_SENT_MESSAGE: &str = "/getLastSentMessage";
    pub const LAST_CIRCUIT: &str = "/getLastCircuit";
}

/// Liveness body returned by every `/status` route
pub const STATUS_LIVE: &str = "Live";
