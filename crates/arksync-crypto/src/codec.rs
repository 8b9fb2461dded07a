//! Encrypted file container.
//!
//! ## Layout
//!
//! ```text
//! HEADER (23 bytes) | version (1 byte) | block length (u32 BE) | metadata block | body
//!
//! metadata block = envelope length (u32 BE) | signed envelope (CBOR) | random padding
//! body           = plaintext XOR ChaCha20 keystream
//! ```
//!
//! The padding hides the exact envelope size. The body key and nonce are
//! generated fresh for every container and travel only inside the sealed
//! part of the signed envelope.
//!
//! Readers verify the signature before trusting `size`/`checksum`, unseal the
//! private metadata, and only then hand out a decrypting reader. The
//! decrypting reader checks the plaintext length and checksum when it reaches
//! the end of the body.

use std::io::{self, Read, Write};

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::{Rng, RngCore};

use arksync_core::Sha256Hasher;

use crate::error::{CryptoError, Result};
use crate::keys::{FileKeyring, SignerPublicKey, X25519StaticSecret};
use crate::metadata::{BodyCipher, EncryptedFileMetadata, PlainMetadata, PrivateMetadata};

/// Magic bytes at the start of every container.
pub const HEADER: &[u8; 23] = b"ARKSYNC ENCRYPTED FILE\0";

/// Current container format version.
pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on the metadata block, padding included.
pub const MAX_METADATA_BLOCK: u32 = 16 * 1024;

const MIN_PADDING: usize = 32;
const MAX_PADDING: usize = 160;
const CHUNK_SIZE: usize = 64 * 1024;

/// Write `input` as an encrypted container to `output`.
///
/// `plain` declares the size and checksum of `input`. If the bytes read do
/// not match, the call fails with [`CryptoError::PlaintextMismatch`] after
/// the body has been written; callers must discard `output` in that case.
///
/// Returns the number of plaintext bytes written.
pub fn write_encrypted<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    plain: &PlainMetadata,
    keyring: &FileKeyring,
) -> Result<u64> {
    let private = PrivateMetadata::generate();
    let metadata = EncryptedFileMetadata {
        plain: *plain,
        private,
    };
    let envelope = metadata.seal_and_sign(&keyring.signing, &keyring.recipient())?;

    let block = metadata_block(&envelope)?;
    output.write_all(HEADER)?;
    output.write_all(&[FORMAT_VERSION])?;
    output.write_all(&(block.len() as u32).to_be_bytes())?;
    output.write_all(&block)?;

    let mut cipher = body_cipher(&metadata.private)?;
    let mut hasher = Sha256Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        cipher.apply_keystream(&mut buf[..n]);
        output.write_all(&buf[..n])?;
    }
    output.flush()?;

    let written = hasher.length();
    if written != plain.size {
        return Err(CryptoError::PlaintextMismatch(format!(
            "declared {} bytes, got {}",
            plain.size, written
        )));
    }
    let actual = hasher.finalize();
    if actual != plain.checksum {
        return Err(CryptoError::PlaintextMismatch(format!(
            "declared checksum {}, got {}",
            plain.checksum, actual
        )));
    }

    Ok(written)
}

/// Read and verify only the plain metadata of a container.
pub fn read_plain_metadata<R: Read>(mut input: R, trusted: &[SignerPublicKey]) -> Result<PlainMetadata> {
    let envelope = read_envelope(&mut input)?;
    EncryptedFileMetadata::verify_plain(&envelope, trusted)
}

/// Open a container written with `keyring`.
pub fn open_encrypted<R: Read>(input: R, keyring: &FileKeyring) -> Result<(PlainMetadata, DecryptingReader<R>)> {
    open_encrypted_with(input, &[keyring.signer()], &keyring.encryption)
}

/// Open a container, accepting signatures from any of `trusted`.
pub fn open_encrypted_with<R: Read>(
    mut input: R,
    trusted: &[SignerPublicKey],
    secret: &X25519StaticSecret,
) -> Result<(PlainMetadata, DecryptingReader<R>)> {
    let envelope = read_envelope(&mut input)?;
    let metadata = EncryptedFileMetadata::verify_and_open(&envelope, trusted, secret)?;
    let cipher = body_cipher(&metadata.private)?;

    let reader = DecryptingReader {
        inner: input,
        cipher,
        plain: metadata.plain,
        hasher: Sha256Hasher::new(),
        finished: false,
    };
    Ok((metadata.plain, reader))
}

/// Streaming decryption of a container body.
///
/// Yields an `InvalidData` I/O error at end of stream if the plaintext does
/// not match the signed size and checksum.
pub struct DecryptingReader<R> {
    inner: R,
    cipher: ChaCha20,
    plain: PlainMetadata,
    hasher: Sha256Hasher,
    finished: bool,
}

impl<R> DecryptingReader<R> {
    /// The verified plain metadata of this container.
    pub fn plain(&self) -> &PlainMetadata {
        &self.plain
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }

        let n = self.inner.read(buf)?;
        if n == 0 {
            self.finished = true;
            let hasher = std::mem::take(&mut self.hasher);
            if hasher.length() != self.plain.size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "container body has {} bytes, expected {}",
                        hasher.length(),
                        self.plain.size
                    ),
                ));
            }
            if hasher.finalize() != self.plain.checksum {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "container body does not match its checksum",
                ));
            }
            return Ok(0);
        }

        self.cipher.apply_keystream(&mut buf[..n]);
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

fn body_cipher(private: &PrivateMetadata) -> Result<ChaCha20> {
    match private.body_cipher()? {
        BodyCipher::ChaCha20 => ChaCha20::new_from_slices(&private.key, &private.nonce)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string())),
    }
}

fn metadata_block(envelope: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let padding = rng.gen_range(MIN_PADDING..MAX_PADDING);

    let mut block = Vec::with_capacity(4 + envelope.len() + padding);
    block.extend_from_slice(&(envelope.len() as u32).to_be_bytes());
    block.extend_from_slice(envelope);
    let start = block.len();
    block.resize(start + padding, 0);
    rng.fill_bytes(&mut block[start..]);

    if block.len() > MAX_METADATA_BLOCK as usize {
        return Err(CryptoError::MetadataTooLarge(block.len() as u32));
    }
    Ok(block)
}

fn read_envelope<R: Read>(input: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER.len()];
    read_exact_or(input, &mut header, "truncated header")?;
    if &header != HEADER {
        return Err(CryptoError::InvalidHeader("header mismatch".into()));
    }

    let mut version = [0u8; 1];
    read_exact_or(input, &mut version, "missing version")?;
    if version[0] != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(version[0]));
    }

    let mut length = [0u8; 4];
    read_exact_or(input, &mut length, "missing metadata length")?;
    let length = u32::from_be_bytes(length);
    if length > MAX_METADATA_BLOCK {
        return Err(CryptoError::MetadataTooLarge(length));
    }

    let mut block = vec![0u8; length as usize];
    read_exact_or(input, &mut block, "truncated metadata block")?;

    // The envelope length lives inside the block; a corrupted prefix means
    // the signed envelope cannot be located, let alone verified.
    let envelope_len = block
        .get(..4)
        .and_then(|prefix| <[u8; 4]>::try_from(prefix).ok())
        .map(|prefix| u32::from_be_bytes(prefix) as usize)
        .ok_or(CryptoError::SignatureVerificationFailed)?;
    block
        .get(4..4 + envelope_len)
        .map(<[u8]>::to_vec)
        .ok_or(CryptoError::SignatureVerificationFailed)
}

fn read_exact_or<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CryptoError::InvalidHeader(what.to_string()),
        _ => CryptoError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use arksync_core::Sha256Digest;
    use proptest::prelude::*;

    use super::*;

    fn plain_for(data: &[u8]) -> PlainMetadata {
        PlainMetadata {
            size: data.len() as u64,
            checksum: Sha256Digest::hash(data),
        }
    }

    fn encrypt(data: &[u8], keyring: &FileKeyring) -> Vec<u8> {
        let mut container = Vec::new();
        write_encrypted(data, &mut container, &plain_for(data), keyring).unwrap();
        container
    }

    fn decrypt(container: &[u8], keyring: &FileKeyring) -> Result<(PlainMetadata, Vec<u8>)> {
        let (plain, mut reader) = open_encrypted(container, keyring)?;
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        Ok((plain, body))
    }

    /// Offset of the first body byte.
    fn body_offset(container: &[u8]) -> usize {
        let len_at = HEADER.len() + 1;
        let block_len = u32::from_be_bytes(container[len_at..len_at + 4].try_into().unwrap());
        len_at + 4 + block_len as usize
    }

    #[test]
    fn test_roundtrip() {
        let keyring = FileKeyring::generate();
        let data = b"The quick brown fox jumps over the lazy dog".repeat(5000);

        let container = encrypt(&data, &keyring);
        assert!(container.starts_with(HEADER));
        assert_eq!(container[HEADER.len()], FORMAT_VERSION);

        let (plain, body) = decrypt(&container, &keyring).unwrap();
        assert_eq!(plain, plain_for(&data));
        assert_eq!(body, data);
    }

    #[test]
    fn test_body_is_not_plaintext() {
        let keyring = FileKeyring::generate();
        let data = vec![0u8; 4096];
        let container = encrypt(&data, &keyring);
        let body = &container[body_offset(&container)..];
        assert_eq!(body.len(), data.len());
        assert_ne!(body, &data[..]);
    }

    #[test]
    fn test_fresh_key_per_file() {
        let keyring = FileKeyring::generate();
        let data = b"identical content";
        let a = encrypt(data, &keyring);
        let b = encrypt(data, &keyring);
        assert_ne!(&a[body_offset(&a)..], &b[body_offset(&b)..]);
    }

    #[test]
    fn test_tampered_metadata_fails_signature() {
        let keyring = FileKeyring::generate();
        let mut container = encrypt(b"payload", &keyring);

        // First byte of the signed envelope, past the inner length prefix.
        let envelope_start = HEADER.len() + 1 + 4 + 4;
        container[envelope_start + 10] ^= 0x40;

        assert!(matches!(
            open_encrypted(&container[..], &keyring),
            Err(CryptoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_foreign_keyring_rejected() {
        let keyring = FileKeyring::generate();
        let container = encrypt(b"payload", &keyring);
        let stranger = FileKeyring::generate();

        assert!(matches!(
            open_encrypted(&container[..], &stranger),
            Err(CryptoError::SignatureVerificationFailed)
        ));
        // Trusting the right signer but lacking the secret is a decryption failure.
        assert!(matches!(
            open_encrypted_with(&container[..], &[keyring.signer()], &stranger.encryption),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_tampered_body_detected_at_end() {
        let keyring = FileKeyring::generate();
        let mut container = encrypt(b"some body bytes", &keyring);
        let last = container.len() - 1;
        container[last] ^= 0xff;

        let err = decrypt(&container, &keyring).unwrap_err();
        match err {
            CryptoError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_and_version_checks() {
        let keyring = FileKeyring::generate();
        assert!(matches!(
            open_encrypted(&b"plainly not a container"[..], &keyring),
            Err(CryptoError::InvalidHeader(_))
        ));

        let mut container = encrypt(b"x", &keyring);
        container[HEADER.len()] = 9;
        assert!(matches!(
            open_encrypted(&container[..], &keyring),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_oversized_metadata_rejected() {
        let keyring = FileKeyring::generate();
        let mut container = encrypt(b"x", &keyring);
        let len_at = HEADER.len() + 1;
        container[len_at..len_at + 4].copy_from_slice(&(MAX_METADATA_BLOCK + 1).to_be_bytes());

        assert!(matches!(
            open_encrypted(&container[..], &keyring),
            Err(CryptoError::MetadataTooLarge(_))
        ));
    }

    #[test]
    fn test_writer_rejects_mismatched_plaintext() {
        let keyring = FileKeyring::generate();
        let mut out = Vec::new();
        let declared = plain_for(b"expected");

        let result = write_encrypted(&b"different"[..], &mut out, &declared, &keyring);
        assert!(matches!(result, Err(CryptoError::PlaintextMismatch(_))));
    }

    #[test]
    fn test_plain_metadata_only() {
        let keyring = FileKeyring::generate();
        let container = encrypt(b"abc", &keyring);
        let plain = read_plain_metadata(&container[..], &[keyring.signer()]).unwrap();
        assert_eq!(plain, plain_for(b"abc"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let keyring = FileKeyring::from_seeds([3; 32], [4; 32]);
            let container = encrypt(&data, &keyring);
            let (plain, body) = decrypt(&container, &keyring).unwrap();
            prop_assert_eq!(plain, plain_for(&data));
            prop_assert_eq!(body, data);
        }
    }
}
