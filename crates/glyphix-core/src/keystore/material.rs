//! Secret key material held inside a key store
//!
//! Raw bytes never leave this type: callers get AEAD and MAC operations,
//! not the key. Material is zeroized on drop.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyError;
use crate::{KEY_SIZE, MAC_SIZE, NONCE_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// A 256-bit symmetric key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_SIZE]);

impl KeyMaterial {
    /// Generate fresh key material from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Import key material; must be exactly [`KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            KeyError::InvalidMaterial(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Encode for at-rest storage inside an encrypted vault
    pub(crate) fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from at-rest storage
    pub(crate) fn from_hex(s: &str) -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// ChaCha20-Poly1305 encrypt; the returned ciphertext carries the tag
    pub fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        if nonce.len() != NONCE_SIZE {
            return Err(KeyError::Storage(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                nonce.len()
            )));
        }

        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| KeyError::Storage(format!("Invalid key: {}", e)))?;

        cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| KeyError::Storage(format!("Encryption failed: {}", e)))
    }

    /// ChaCha20-Poly1305 decrypt and verify
    ///
    /// A nonce of the wrong length is treated like any other tampering.
    pub fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, KeyError> {
        if nonce.len() != NONCE_SIZE {
            return Err(KeyError::AuthenticationFailed);
        }

        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| KeyError::Storage(format!("Invalid key: {}", e)))?;

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| KeyError::AuthenticationFailed)
    }

    /// HMAC-SHA256 over `data`
    pub fn mac(&self, data: &[u8]) -> Result<[u8; MAC_SIZE], KeyError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.0)
            .map_err(|e| KeyError::Storage(format!("Invalid MAC key: {}", e)))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().into())
    }

    /// Constant-time HMAC-SHA256 verification
    pub fn verify_mac(&self, data: &[u8], tag: &[u8]) -> Result<bool, KeyError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.0)
            .map_err(|e| KeyError::Storage(format!("Invalid MAC key: {}", e)))?;
        mac.update(data);
        Ok(mac.verify_slice(tag).is_ok())
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let key = KeyMaterial::generate();
        let nonce = [7u8; NONCE_SIZE];

        let ct = key.seal(&nonce, b"aad", b"hello").unwrap();
        assert_ne!(ct.as_slice(), b"hello");

        let pt = key.open(&nonce, b"aad", &ct).unwrap();
        assert_eq!(pt.as_slice(), b"hello");
    }

    #[test]
    fn test_open_rejects_wrong_aad() {
        let key = KeyMaterial::generate();
        let nonce = [7u8; NONCE_SIZE];
        let ct = key.seal(&nonce, b"alias-a", b"hello").unwrap();

        let result = key.open(&nonce, b"alias-b", &ct);
        assert!(matches!(result, Err(KeyError::AuthenticationFailed)));
    }

    #[test]
    fn test_open_rejects_short_nonce() {
        let key = KeyMaterial::generate();
        let ct = key.seal(&[0u8; NONCE_SIZE], b"", b"hello").unwrap();

        let result = key.open(&[0u8; 4], b"", &ct);
        assert!(matches!(result, Err(KeyError::AuthenticationFailed)));
    }

    #[test]
    fn test_mac_verify() {
        let key = KeyMaterial::generate();
        let tag = key.mac(b"payload").unwrap();

        assert!(key.verify_mac(b"payload", &tag).unwrap());
        assert!(!key.verify_mac(b"payl0ad", &tag).unwrap());

        let other = KeyMaterial::generate();
        assert!(!other.verify_mac(b"payload", &tag).unwrap());
    }

    #[test]
    fn test_from_slice_length() {
        assert!(KeyMaterial::from_slice(&[1u8; KEY_SIZE]).is_ok());
        assert!(matches!(
            KeyMaterial::from_slice(&[1u8; 16]),
            Err(KeyError::InvalidMaterial(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = KeyMaterial::from_slice(&[0xAB; KEY_SIZE]).unwrap();
        let printed = format!("{:?}", key);
        assert!(!printed.contains("ab"));
        assert!(printed.contains("REDACTED"));
    }
}
