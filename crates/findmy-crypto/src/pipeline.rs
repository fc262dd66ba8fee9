//! Per-file decryption pipeline: container decode → envelope open → classify.
//!
//! One [`CacheDecryptor`] owns the per-run [`KeyRing`] and decrypts any number
//! of cache files against it. Every failure is a typed [`PipelineError`] so
//! callers can continue past a bad file or group; an authentication failure is
//! final for that file (AEAD failure is not transient) and yields no partial
//! output.

use std::io::Cursor;

use thiserror::Error;

use crate::classify::{classify, Classification};
use crate::envelope::{self, AeadError};
use crate::key::{KeyGroup, KeyRing, SymmetricKey};

/// Name of the envelope field inside a cache container.
pub const ENCRYPTED_DATA_FIELD: &str = "encryptedData";

/// Errors produced while decrypting one cache file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The container bytes are not a decodable plist.
    #[error("cache container is not a decodable plist: {0}")]
    ContainerDecodeFailed(String),

    /// The decoded container has no non-empty `encryptedData` byte field.
    #[error("cache container has no usable `{ENCRYPTED_DATA_FIELD}` field")]
    MissingEnvelope,

    /// No key is installed for the requested group.
    #[error("no {0} key installed")]
    KeyUnavailable(KeyGroup),

    /// The envelope failed to open.
    #[error("envelope decryption failed: {0}")]
    DecryptionFailed(#[from] AeadError),
}

/// One successfully decrypted cache file.
#[derive(Debug)]
pub struct DecryptedCache {
    /// The verified plaintext, byte-for-byte.
    pub plaintext: Vec<u8>,
    /// What the plaintext turned out to be.
    pub classified: Classification,
}

/// Decrypts cache files against the per-run [`KeyRing`].
#[derive(Debug, Default)]
pub struct CacheDecryptor {
    keys: KeyRing,
}

impl CacheDecryptor {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyRing {
        &mut self.keys
    }

    /// Decrypt one cache container under the given group's key.
    ///
    /// Takes `&self`: decryption is read-only over the keyring, so files
    /// sharing a group can be processed concurrently.
    ///
    /// # Errors
    ///
    /// [`PipelineError::KeyUnavailable`] when the group's slot is empty,
    /// otherwise whatever [`decrypt_cache_with_key`] reports.
    pub fn decrypt_cache(
        &self,
        container_bytes: &[u8],
        group: KeyGroup,
    ) -> Result<DecryptedCache, PipelineError> {
        let key = self
            .keys
            .get(group)
            .ok_or(PipelineError::KeyUnavailable(group))?;
        decrypt_cache_with_key(container_bytes, key)
    }
}

/// Decrypt one cache container with an explicit key, bypassing the keyring.
///
/// # Errors
///
/// - [`PipelineError::ContainerDecodeFailed`] if the bytes are not a plist
/// - [`PipelineError::MissingEnvelope`] if the root is not a dictionary with a
///   non-empty `encryptedData` byte field
/// - [`PipelineError::DecryptionFailed`] if the envelope is malformed or
///   fails authentication
pub fn decrypt_cache_with_key(
    container_bytes: &[u8],
    key: &SymmetricKey,
) -> Result<DecryptedCache, PipelineError> {
    let container = plist::Value::from_reader(Cursor::new(container_bytes))
        .map_err(|err| PipelineError::ContainerDecodeFailed(err.to_string()))?;
    let root = container
        .as_dictionary()
        .ok_or(PipelineError::MissingEnvelope)?;

    let envelope_bytes = match root.get(ENCRYPTED_DATA_FIELD) {
        Some(plist::Value::Data(bytes)) if !bytes.is_empty() => bytes.as_slice(),
        _ => return Err(PipelineError::MissingEnvelope),
    };

    let plaintext = envelope::open(envelope_bytes, key)?;
    let classified = classify(&plaintext);
    Ok(DecryptedCache {
        plaintext,
        classified,
    })
}
