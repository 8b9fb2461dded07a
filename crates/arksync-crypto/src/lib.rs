//! # arksync crypto
//!
//! The encrypted file container used by encrypted repositories.
//!
//! ## Overview
//!
//! Each stored file becomes one self-describing container: a fixed header,
//! a signed metadata envelope, and a stream-encrypted body. The envelope
//! carries the plaintext size and checksum in the clear (signed) and the
//! per-file body key sealed to the repository's X25519 key.
//!
//! ## Key Types
//!
//! - [`FileKeyring`] - Signing and sealing keys of one repository
//! - [`PlainMetadata`] - Signed, visible size and checksum
//! - [`PrivateMetadata`] - Sealed body cipher, key and nonce
//! - [`DecryptingReader`] - Streaming body decryption with end-of-stream check
//!
//! ## Usage
//!
//! ```rust
//! use std::io::Read;
//! use arksync_core::Sha256Digest;
//! use arksync_crypto::{open_encrypted, write_encrypted, FileKeyring, PlainMetadata};
//!
//! let keyring = FileKeyring::generate();
//! let data = b"archived bytes";
//! let plain = PlainMetadata { size: data.len() as u64, checksum: Sha256Digest::hash(data) };
//!
//! let mut container = Vec::new();
//! write_encrypted(&data[..], &mut container, &plain, &keyring).unwrap();
//!
//! let (meta, mut reader) = open_encrypted(&container[..], &keyring).unwrap();
//! let mut body = Vec::new();
//! reader.read_to_end(&mut body).unwrap();
//! assert_eq!(meta, plain);
//! assert_eq!(body, data);
//! ```

pub mod codec;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod sealed;

pub use codec::{
    open_encrypted, open_encrypted_with, read_plain_metadata, write_encrypted, DecryptingReader,
    FORMAT_VERSION, HEADER, MAX_METADATA_BLOCK,
};
pub use error::{CryptoError, Result};
pub use keys::{FileKeyring, SignerPublicKey, SigningKeypair, X25519PublicKey, X25519StaticSecret};
pub use metadata::{BodyCipher, EncryptedFileMetadata, PlainMetadata, PrivateMetadata};
pub use sealed::{SealFormat, SealedEnvelope};
