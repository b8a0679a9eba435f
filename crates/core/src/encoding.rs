//! Base64 transport encoding
//!
//! Every byte field crossing the wire travels as standard base64 text. The
//! cipher code never sees base64; conversion happens here, at the serde edge.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{OnionError, Result};

/// Encode bytes as standard base64
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 text
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| OnionError::Validation(format!("invalid base64: {}", e)))
}

/// Serde adapter for `Vec<u8>` fields carried as base64 strings
pub mod base64_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode(&text).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional base64 fields
///
/// Pair with `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod base64_opt {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => super::decode(&text).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

/// Short printable preview of a byte buffer for debug logs
pub fn preview(bytes: &[u8]) -> String {
    let shown: Vec<String> = bytes.iter().take(20).map(|b| format!("{:02x}", b)).collect();
    format!("({} bytes) {}...", bytes.len(), shown.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_value() {
        assert_eq!(encode(b"hello"), "aGVsbG8=");
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        assert_eq!(decode(" aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode("not base64 !!");
        assert!(matches!(result, Err(OnionError::Validation(_))));
    }

    #[test]
    fn test_preview_truncates() {
        let data = [0xabu8; 64];
        let shown = preview(&data);
        assert!(shown.starts_with("(64 bytes) ab ab"));
        assert_eq!(shown.matches("ab").count(), 20);
    }
}
