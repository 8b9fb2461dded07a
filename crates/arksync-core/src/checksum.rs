//! SHA-256 content identity.
//!
//! Every file in every repository is identified by the SHA-256 digest of its
//! raw bytes. Paths are incidental; the digest is the key.

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// A 32-byte SHA-256 digest of file contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the digest of a byte slice.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Compute the digest of everything a reader yields.
    ///
    /// Returns the digest together with the number of bytes read.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<(Self, u64)> {
        let mut hasher = Sha256Hasher::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let length = hasher.length();
        Ok((hasher.finalize(), length))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidChecksum(format!("{s}: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidChecksum(format!("{s}: expected 32 bytes")))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Sha256Digest {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Incremental SHA-256 over a stream of chunks.
///
/// Tracks the number of bytes fed so callers can check a declared length
/// alongside the digest.
#[derive(Clone, Default)]
pub struct Sha256Hasher {
    inner: Sha256,
    length: u64,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.length += chunk.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn finalize(self) -> Sha256Digest {
        Sha256Digest(self.inner.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let digest = Sha256Digest::hash(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let digest = Sha256Digest::hash(b"hello");
        let parsed = Sha256Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Sha256Digest::from_hex("abcd").is_err());
        assert!(Sha256Digest::from_hex("zz").is_err());
    }

    #[test]
    fn test_streaming_matches_oneshot() {
        let data = vec![7u8; 200_000];
        let (streamed, length) = Sha256Digest::from_reader(&data[..]).unwrap();
        assert_eq!(streamed, Sha256Digest::hash(&data));
        assert_eq!(length, 200_000);
    }

    #[test]
    fn test_debug_is_truncated() {
        let digest = Sha256Digest::from_bytes([0xab; 32]);
        assert_eq!(format!("{:?}", digest), "Sha256Digest(abababababababab)");
    }
}
