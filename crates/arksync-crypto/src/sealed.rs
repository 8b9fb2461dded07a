//! Sealed envelope: anonymous-sender encryption to an X25519 recipient.
//!
//! The sender generates an ephemeral key pair, agrees a shared secret with
//! the recipient's static key, derives a ChaCha20-Poly1305 key from it and
//! encrypts. Only the holder of the recipient secret can open the envelope.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::keys::{EphemeralKeyPair, X25519PublicKey, X25519StaticSecret};

/// Format identifier for sealed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    /// X25519 + blake3 key derivation + ChaCha20-Poly1305.
    X25519ChaCha20Poly1305 = 1,
}

/// Ciphertext readable only by one X25519 recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub format: SealFormat,
    pub ephemeral_public: X25519PublicKey,
    pub nonce: [u8; 12],
    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Encrypt `plaintext` so that only `recipient` can read it.
    pub fn seal(plaintext: &[u8], recipient: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let key = ephemeral
            .diffie_hellman(recipient)
            .derive_key(&ephemeral_public, recipient);

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        Ok(Self {
            format: SealFormat::X25519ChaCha20Poly1305,
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the recipient's secret.
    pub fn open(&self, secret: &X25519StaticSecret) -> Result<Vec<u8>> {
        match self.format {
            SealFormat::X25519ChaCha20Poly1305 => {
                let key = secret
                    .diffie_hellman(&self.ephemeral_public)
                    .derive_key(&self.ephemeral_public, &secret.public_key());

                let cipher = ChaCha20Poly1305::new_from_slice(&key)
                    .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
                cipher
                    .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref())
                    .map_err(|_| CryptoError::DecryptionFailed("sealed metadata rejected".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let recipient = X25519StaticSecret::generate();
        let envelope = SealedEnvelope::seal(b"secret key material", &recipient.public_key()).unwrap();
        assert_eq!(envelope.open(&recipient).unwrap(), b"secret key material");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = X25519StaticSecret::generate();
        let stranger = X25519StaticSecret::generate();
        let envelope = SealedEnvelope::seal(b"data", &recipient.public_key()).unwrap();

        assert!(matches!(
            envelope.open(&stranger),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_fresh_ephemeral_per_seal() {
        let recipient = X25519StaticSecret::generate();
        let a = SealedEnvelope::seal(b"same", &recipient.public_key()).unwrap();
        let b = SealedEnvelope::seal(b"same", &recipient.public_key()).unwrap();
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
