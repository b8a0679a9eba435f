//! Recipient-side decoding of a delivered payload
//!
//! The terminal payload carries zero encryption layers; all that is left is
//! the base64 transport encoding.

use onionmesh_core::{Result, TerminalPayload};

/// Original message bytes
pub fn unwrap_terminal(payload: &TerminalPayload) -> Result<Vec<u8>> {
    payload.decode_data()
}

/// Message as text; invalid UTF-8 sequences are replaced
pub fn unwrap_text(payload: &TerminalPayload) -> Result<String> {
    let bytes = unwrap_terminal(payload)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
