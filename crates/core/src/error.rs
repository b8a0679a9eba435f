use thiserror::Error;

/// Failure taxonomy for every onion operation.
///
/// Each variant is reported once, at the boundary of the operation that
/// raised it. Nothing is retried and there is no state to roll back.
#[derive(Error, Debug)]
pub enum OnionError {
    /// Malformed registration or envelope shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unseal, decrypt or authentication failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Envelope is missing fields required for this hop's role
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Directory holds fewer relays than the requested path length
    #[error("Insufficient relays: need {required}, got {available}")]
    InsufficientRelays { required: usize, available: usize },

    /// Downstream hop unreachable or answered with a failure
    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl OnionError {
    /// Short machine-readable kind, used in error responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            OnionError::Validation(_) => "validation",
            OnionError::Crypto(_) => "crypto",
            OnionError::Protocol(_) => "protocol",
            OnionError::InsufficientRelays { .. } => "insufficient_relays",
            OnionError::Delivery(_) => "delivery",
        }
    }
}

pub type Result<T> = std::result::Result<T, OnionError>;
