//! Container metadata: a signed envelope around plain and sealed parts.
//!
//! The plain part (size and checksum) is readable by anyone but trusted only
//! after the signature verifies. The private part (body cipher, key, nonce)
//! is sealed to the repository's X25519 key.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use arksync_core::Sha256Digest;

use crate::error::{CryptoError, Result};
use crate::keys::{SignerPublicKey, SigningKeypair, X25519PublicKey, X25519StaticSecret};
use crate::sealed::SealedEnvelope;

/// Domain separation prefix for metadata signatures.
const SIGNATURE_DOMAIN: &[u8] = b"arksync-container-v1 metadata\0";

/// Size and checksum of the plaintext body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainMetadata {
    pub size: u64,
    pub checksum: Sha256Digest,
}

/// Stream ciphers the body may be encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCipher {
    /// IETF ChaCha20, 256-bit key, 96-bit nonce.
    ChaCha20,
}

impl BodyCipher {
    pub fn id(&self) -> &'static str {
        match self {
            Self::ChaCha20 => "ChaCha20",
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        match id {
            "ChaCha20" => Ok(Self::ChaCha20),
            other => Err(CryptoError::UnsupportedCipher(other.to_string())),
        }
    }
}

/// Per-file secrets. Generated fresh for every container.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMetadata {
    pub cipher: String,
    pub key: [u8; 32],
    pub nonce: [u8; 12],
}

impl PrivateMetadata {
    /// Fresh random key and nonce for the default body cipher.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut key = [0u8; 32];
        let mut nonce = [0u8; 12];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut nonce);
        Self {
            cipher: BodyCipher::ChaCha20.id().to_string(),
            key,
            nonce,
        }
    }

    pub fn body_cipher(&self) -> Result<BodyCipher> {
        BodyCipher::from_id(&self.cipher)
    }
}

impl std::fmt::Debug for PrivateMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateMetadata")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

/// The signed bytes: plain metadata plus the sealed private metadata.
#[derive(Serialize, Deserialize)]
struct MetadataPayload {
    plain: PlainMetadata,
    sealed: SealedEnvelope,
}

/// Wire form of the metadata block.
#[derive(Serialize, Deserialize)]
struct SignedMetadata {
    payload: Vec<u8>,
    signature: Vec<u8>,
}

/// Both halves of a container's metadata, after decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFileMetadata {
    pub plain: PlainMetadata,
    pub private: PrivateMetadata,
}

impl EncryptedFileMetadata {
    /// Seal the private part to `recipient`, sign the result, encode as CBOR.
    pub fn seal_and_sign(&self, signer: &SigningKeypair, recipient: &X25519PublicKey) -> Result<Vec<u8>> {
        let private = to_cbor(&self.private)?;
        let payload = MetadataPayload {
            plain: self.plain,
            sealed: SealedEnvelope::seal(&private, recipient)?,
        };
        let payload = to_cbor(&payload)?;
        let signature = signer.sign(&signing_message(&payload)).to_vec();

        to_cbor(&SignedMetadata { payload, signature })
    }

    /// Verify the signature and return only the plain part.
    pub fn verify_plain(bytes: &[u8], trusted: &[SignerPublicKey]) -> Result<PlainMetadata> {
        verify(bytes, trusted).map(|payload| payload.plain)
    }

    /// Verify the signature, then open the sealed private part.
    pub fn verify_and_open(
        bytes: &[u8],
        trusted: &[SignerPublicKey],
        secret: &X25519StaticSecret,
    ) -> Result<Self> {
        let payload = verify(bytes, trusted)?;
        let private: PrivateMetadata = ciborium::from_reader(&payload.sealed.open(secret)?[..])
            .map_err(|e| CryptoError::DecryptionFailed(format!("private metadata: {e}")))?;

        Ok(Self {
            plain: payload.plain,
            private,
        })
    }
}

fn verify(bytes: &[u8], trusted: &[SignerPublicKey]) -> Result<MetadataPayload> {
    // An envelope that does not even parse cannot have a valid signature.
    let signed: SignedMetadata =
        ciborium::from_reader(bytes).map_err(|_| CryptoError::SignatureVerificationFailed)?;

    let message = signing_message(&signed.payload);
    if !trusted
        .iter()
        .any(|key| key.verify(&message, &signed.signature).is_ok())
    {
        return Err(CryptoError::SignatureVerificationFailed);
    }

    ciborium::from_reader(&signed.payload[..]).map_err(|e| CryptoError::Serialization(e.to_string()))
}

fn signing_message(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(SIGNATURE_DOMAIN.len() + payload.len());
    message.extend_from_slice(SIGNATURE_DOMAIN);
    message.extend_from_slice(payload);
    message
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::FileKeyring;

    fn sample() -> EncryptedFileMetadata {
        EncryptedFileMetadata {
            plain: PlainMetadata {
                size: 11,
                checksum: Sha256Digest::hash(b"hello world"),
            },
            private: PrivateMetadata::generate(),
        }
    }

    #[test]
    fn test_seal_sign_open_roundtrip() {
        let keyring = FileKeyring::generate();
        let metadata = sample();
        let bytes = metadata.seal_and_sign(&keyring.signing, &keyring.recipient()).unwrap();

        let opened =
            EncryptedFileMetadata::verify_and_open(&bytes, &[keyring.signer()], &keyring.encryption).unwrap();
        assert_eq!(opened, metadata);
    }

    #[test]
    fn test_untrusted_signer_rejected() {
        let keyring = FileKeyring::generate();
        let other = FileKeyring::generate();
        let bytes = sample().seal_and_sign(&keyring.signing, &keyring.recipient()).unwrap();

        assert!(matches!(
            EncryptedFileMetadata::verify_plain(&bytes, &[other.signer()]),
            Err(CryptoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_signature_checked_before_decryption() {
        let keyring = FileKeyring::generate();
        let mut bytes = sample().seal_and_sign(&keyring.signing, &keyring.recipient()).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x01;

        assert!(matches!(
            EncryptedFileMetadata::verify_and_open(&bytes, &[keyring.signer()], &keyring.encryption),
            Err(CryptoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_wrong_recipient_is_decryption_failure() {
        let keyring = FileKeyring::generate();
        let stranger = FileKeyring::generate();
        let bytes = sample().seal_and_sign(&keyring.signing, &stranger.recipient()).unwrap();

        assert!(EncryptedFileMetadata::verify_plain(&bytes, &[keyring.signer()]).is_ok());
        assert!(matches!(
            EncryptedFileMetadata::verify_and_open(&bytes, &[keyring.signer()], &keyring.encryption),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_unknown_cipher() {
        assert!(matches!(
            BodyCipher::from_id("AES-128-CFB"),
            Err(CryptoError::UnsupportedCipher(_))
        ));
    }
}
