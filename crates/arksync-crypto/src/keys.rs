//! Key material used by encrypted repositories.
//!
//! A repository holds two keys: an Ed25519 key that signs container metadata,
//! and an X25519 key that receives sealed per-file secrets.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CryptoError, Result};

/// An Ed25519 verifying key identifying who signed a container.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerPublicKey(pub [u8; 32]);

impl SignerPublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::SignatureVerificationFailed)?;
        let bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| CryptoError::SignatureVerificationFailed)?;

        key.verify_strict(message, &Signature::from_bytes(&bytes))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl fmt::Debug for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerPublicKey({})", &self.to_hex()[..16])
    }
}

/// An Ed25519 signing key.
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> SignerPublicKey {
        SignerPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeypair({:?})", self.public_key())
    }
}

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// The X25519 secret that opens sealed per-file secrets.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    pub(crate) fn diffie_hellman(&self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.0.diffie_hellman(&peer.to_dalek()).as_bytes())
    }
}

/// One-time key pair used by the sender of a sealed envelope.
pub(crate) struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub(crate) fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    pub(crate) fn diffie_hellman(self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.secret.diffie_hellman(&peer.to_dalek()).as_bytes())
    }
}

/// Output of X25519 key agreement.
pub(crate) struct SharedKey([u8; 32]);

impl SharedKey {
    /// Derive a ChaCha20-Poly1305 key bound to both public keys.
    pub(crate) fn derive_key(
        &self,
        ephemeral: &X25519PublicKey,
        recipient: &X25519PublicKey,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key("arksync-container-v1 sealed metadata");
        hasher.update(&self.0);
        hasher.update(ephemeral.as_bytes());
        hasher.update(recipient.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// Everything a repository needs to write and read its own containers.
pub struct FileKeyring {
    pub signing: SigningKeypair,
    pub encryption: X25519StaticSecret,
}

impl FileKeyring {
    pub fn generate() -> Self {
        Self {
            signing: SigningKeypair::generate(),
            encryption: X25519StaticSecret::generate(),
        }
    }

    /// Deterministic keyring, for tests and fixtures.
    pub fn from_seeds(signing_seed: [u8; 32], encryption_seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKeypair::from_seed(&signing_seed),
            encryption: X25519StaticSecret::from_bytes(encryption_seed),
        }
    }

    pub fn signer(&self) -> SignerPublicKey {
        self.signing.public_key()
    }

    pub fn recipient(&self) -> X25519PublicKey {
        self.encryption.public_key()
    }
}

impl fmt::Debug for FileKeyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyring")
            .field("signer", &self.signer())
            .finish_non_exhaustive()
    }
}
