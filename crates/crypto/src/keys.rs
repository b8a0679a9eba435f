use openssl::encrypt::{Decrypter, Encrypter};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{HasPrivate, HasPublic, Id, PKey, PKeyRef, Private, Public};
use openssl::rsa::{Padding, Rsa};
use sha2::{Digest, Sha256};

use onionmesh_core::config::RSA_KEY_BITS;
use onionmesh_core::encoding;

use crate::{CryptoError, Result};

/// SHA-256 output length, used by both OAEP and MGF1
const OAEP_HASH_LEN: usize = 32;

/// Relay public key (RSA, OAEP/SHA-256 key wrapping).
///
/// Cheap to clone: the underlying OpenSSL key is reference counted.
#[derive(Clone)]
pub struct RelayPublicKey {
    key: PKey<Public>,
}

impl RelayPublicKey {
    /// Import from SPKI DER bytes
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let key = PKey::public_key_from_der(der)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        if key.id() != Id::RSA {
            return Err(CryptoError::InvalidPublicKey("not an RSA key".to_string()));
        }
        if key.bits() < RSA_KEY_BITS {
            return Err(CryptoError::InvalidPublicKey(format!(
                "{}-bit modulus below required {} bits",
                key.bits(),
                RSA_KEY_BITS
            )));
        }
        Ok(Self { key })
    }

    /// Import from the base64 SPKI text used on the wire
    pub fn from_base64(text: &str) -> Result<Self> {
        let der = encoding::decode(text)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_spki_der(&der)
    }

    /// Export as SPKI DER bytes
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.key
            .public_key_to_der()
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Export as base64 SPKI text
    pub fn to_base64(&self) -> Result<String> {
        self.to_spki_der().map(encoding::encode)
    }

    /// Largest plaintext one OAEP block can carry under this key
    pub fn max_seal_len(&self) -> usize {
        self.key.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
    }

    /// Short hex fingerprint (SHA-256 of the SPKI), safe to log
    pub fn fingerprint(&self) -> String {
        match self.to_spki_der() {
            Ok(der) => hex::encode(&Sha256::digest(&der)[..8]),
            Err(_) => "unknown".to_string(),
        }
    }
}

impl PartialEq for RelayPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.public_eq(&other.key)
    }
}

impl Eq for RelayPublicKey {}

impl std::fmt::Debug for RelayPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayPublicKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Long-lived relay key pair, generated once at relay startup.
///
/// Read-only after generation, so it can be shared across concurrent hop
/// handlers behind an `Arc` without locking.
pub struct RelayKeypair {
    private: PKey<Private>,
    public: RelayPublicKey,
}

impl RelayKeypair {
    /// Generate a fresh 2048-bit RSA key pair
    pub fn generate() -> Result<Self> {
        let rsa = Rsa::generate(RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let private =
            PKey::from_rsa(rsa).map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Self::from_private(private)
    }

    /// Import from PKCS#8 DER bytes
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = PKey::private_key_from_pkcs8(der)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        if private.id() != Id::RSA {
            return Err(CryptoError::InvalidPrivateKey("not an RSA key".to_string()));
        }
        Self::from_private(private)
    }

    /// Import from base64 PKCS#8 text
    pub fn from_base64(text: &str) -> Result<Self> {
        let der = encoding::decode(text)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_pkcs8_der(&der)
    }

    fn from_private(private: PKey<Private>) -> Result<Self> {
        let spki = private
            .public_key_to_der()
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let public = RelayPublicKey::from_spki_der(&spki)?;
        Ok(Self { private, public })
    }

    pub fn public_key(&self) -> &RelayPublicKey {
        &self.public
    }

    /// Export the private half as PKCS#8 DER
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        self.private
            .private_key_to_pkcs8()
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }

    /// Export the private half as base64 PKCS#8 text
    pub fn private_key_base64(&self) -> Result<String> {
        self.to_pkcs8_der().map(encoding::encode)
    }

    /// Unseal a symmetric key sealed under our public key
    pub fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        unseal_symmetric_key(self, sealed)
    }
}

impl std::fmt::Debug for RelayKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayKeypair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn oaep_encrypter<T: HasPublic>(
    key: &PKeyRef<T>,
) -> std::result::Result<Encrypter<'_>, ErrorStack> {
    let mut encrypter = Encrypter::new(key)?;
    encrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
    encrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
    encrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;
    Ok(encrypter)
}

fn oaep_decrypter<T: HasPrivate>(
    key: &PKeyRef<T>,
) -> std::result::Result<Decrypter<'_>, ErrorStack> {
    let mut decrypter = Decrypter::new(key)?;
    decrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
    decrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
    decrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;
    Ok(decrypter)
}

/// Seal exported symmetric key bytes under a relay public key (RSA-OAEP)
pub fn seal_symmetric_key(public_key: &RelayPublicKey, key_bytes: &[u8]) -> Result<Vec<u8>> {
    let max = public_key.max_seal_len();
    if key_bytes.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            len: key_bytes.len(),
            max,
        });
    }

    let encrypter =
        oaep_encrypter(&public_key.key).map_err(|e| CryptoError::SealFailed(e.to_string()))?;
    let len = encrypter
        .encrypt_len(key_bytes)
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;
    let mut sealed = vec![0u8; len];
    let written = encrypter
        .encrypt(key_bytes, &mut sealed)
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;
    sealed.truncate(written);

    Ok(sealed)
}

/// Recover symmetric key bytes sealed with [`seal_symmetric_key`]
pub fn unseal_symmetric_key(keypair: &RelayKeypair, sealed: &[u8]) -> Result<Vec<u8>> {
    let decrypter = oaep_decrypter(&keypair.private).map_err(|_| CryptoError::UnsealFailed)?;
    let len = decrypter
        .decrypt_len(sealed)
        .map_err(|_| CryptoError::UnsealFailed)?;
    let mut key_bytes = vec![0u8; len];
    let written = decrypter
        .decrypt(sealed, &mut key_bytes)
        .map_err(|_| CryptoError::UnsealFailed)?;
    key_bytes.truncate(written);

    Ok(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_export_import() {
        let kp = RelayKeypair::generate().unwrap();
        let public_text = kp.public_key().to_base64().unwrap();
        let private_text = kp.private_key_base64().unwrap();

        let public = RelayPublicKey::from_base64(&public_text).unwrap();
        let restored = RelayKeypair::from_base64(&private_text).unwrap();

        assert_eq!(&public, kp.public_key());
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let kp = RelayKeypair::generate().unwrap();
        let secret = [7u8; 32];

        let sealed = seal_symmetric_key(kp.public_key(), &secret).unwrap();
        assert_eq!(sealed.len(), 256);

        let unsealed = kp.unseal(&sealed).unwrap();
        assert_eq!(unsealed, secret);
    }

    #[test]
    fn test_seal_is_randomized() {
        let kp = RelayKeypair::generate().unwrap();
        let a = seal_symmetric_key(kp.public_key(), &[1u8; 32]).unwrap();
        let b = seal_symmetric_key(kp.public_key(), &[1u8; 32]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let kp = RelayKeypair::generate().unwrap();
        let other = RelayKeypair::generate().unwrap();

        let sealed = seal_symmetric_key(kp.public_key(), &[3u8; 32]).unwrap();
        let result = other.unseal(&sealed);

        assert!(matches!(result, Err(CryptoError::UnsealFailed)));
    }

    #[test]
    fn test_unseal_corrupted_fails() {
        let kp = RelayKeypair::generate().unwrap();
        let mut sealed = seal_symmetric_key(kp.public_key(), &[3u8; 32]).unwrap();
        sealed[100] ^= 0x01;

        assert!(matches!(kp.unseal(&sealed), Err(CryptoError::UnsealFailed)));
        assert!(matches!(kp.unseal(&sealed[..10]), Err(CryptoError::UnsealFailed)));
    }

    #[test]
    fn test_seal_payload_too_large() {
        let kp = RelayKeypair::generate().unwrap();
        assert_eq!(kp.public_key().max_seal_len(), 190);

        let result = seal_symmetric_key(kp.public_key(), &[0u8; 191]);
        assert!(matches!(
            result,
            Err(CryptoError::PayloadTooLarge { len: 191, max: 190 })
        ));
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            RelayPublicKey::from_base64("bm90IGEga2V5"),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            RelayPublicKey::from_base64("%%%"),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            RelayKeypair::from_base64("bm90IGEga2V5"),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_import_rejects_weak_rsa() {
        let rsa = Rsa::generate(1024).unwrap();
        let der = PKey::from_rsa(rsa).unwrap().public_key_to_der().unwrap();

        let result = RelayPublicKey::from_spki_der(&der);
        assert!(matches!(result, Err(CryptoError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_fingerprint_stable() {
        let kp = RelayKeypair::generate().unwrap();
        let fp = kp.public_key().fingerprint();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, kp.public_key().clone().fingerprint());
    }
}
