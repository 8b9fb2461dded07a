//! Error types for the encrypted file codec.

use thiserror::Error;

/// Errors that can occur while writing or reading encrypted containers.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The stream does not start with the container header.
    #[error("not an encrypted container: {0}")]
    InvalidHeader(String),

    /// The container was written by an unknown format version.
    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u8),

    /// Metadata block length exceeds the allowed maximum.
    #[error("metadata block too large: {0} bytes")]
    MetadataTooLarge(u32),

    /// The metadata signature does not verify.
    #[error("metadata signature verification failed")]
    SignatureVerificationFailed,

    /// The sealed private metadata could not be decrypted.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The body cipher named in the metadata is not supported.
    #[error("unsupported body cipher: {0}")]
    UnsupportedCipher(String),

    /// Encryption failed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Plaintext fed to the writer disagrees with the declared metadata.
    #[error("plaintext does not match declared metadata: {0}")]
    PlaintextMismatch(String),

    /// Envelope serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Integrity failures: the container was tampered with or is not ours.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::SignatureVerificationFailed | Self::DecryptionFailed(_))
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
