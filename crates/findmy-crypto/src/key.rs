//! Key-material extraction from FindMy key containers.
//!
//! A key container is a plist whose root dictionary carries a `symmetricKey`
//! entry in one of two shapes observed across FindMy versions:
//!
//! - **flat**: the `symmetricKey` value is the key itself, either raw bytes or
//!   a base64-encoded string;
//! - **nested**: the `symmetricKey` value is a dictionary
//!   `{ key: { data: <bytes|base64> } }`.
//!
//! The shapes are distinguished by structural inspection of the decoded value,
//! not by producer version. Both normalize to exactly [`KEY_LEN`] bytes of
//! ChaCha20-Poly1305 key material.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Byte length of a FindMy cache symmetric key (ChaCha20-Poly1305).
pub const KEY_LEN: usize = 32;

/// Errors produced while normalizing a key container into a [`SymmetricKey`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionError {
    /// The container has no (or an empty) `symmetricKey` entry.
    #[error("key container has no usable `symmetricKey` entry")]
    MissingField,

    /// The `symmetricKey` entry matches neither the flat nor the nested shape.
    #[error("`symmetricKey` entry does not match either known container shape")]
    InvalidShape,

    /// The key leaf is a string but not valid base64.
    #[error("`symmetricKey` entry is not valid base64")]
    Base64Invalid,

    /// The resolved key material is not exactly [`KEY_LEN`] bytes.
    #[error("symmetric key must be {KEY_LEN} bytes, got {0}")]
    WrongLength(usize),
}

/// Which of the two independent FindMy key namespaces a cache file belongs to.
///
/// The group↔file association is caller configuration (FMIP governs the
/// `fmipcore` caches, FMF governs `FriendCacheData.data`); this crate never
/// infers it from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyGroup {
    /// Find My iPhone (`FMIPDataManager.bplist` key).
    Fmip,
    /// Find My Friends (`FMFDataManager.bplist` key).
    Fmf,
}

impl KeyGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyGroup::Fmip => "FMIP",
            KeyGroup::Fmf => "FMF",
        }
    }

    /// Parse a case-insensitive group name (`fmip` / `fmf`).
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "fmip" => Some(KeyGroup::Fmip),
            "fmf" => Some(KeyGroup::Fmf),
            _ => None,
        }
    }
}

impl fmt::Display for KeyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An exactly-32-byte FindMy cache key. Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Build a key from raw bytes, rejecting any length other than [`KEY_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let raw: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| ExtractionError::WrongLength(bytes.len()))?;
        Ok(SymmetricKey(raw))
    }

    /// Build a key from a base64-encoded string (standard alphabet, padded).
    pub fn from_base64(text: &str) -> Result<Self, ExtractionError> {
        let decoded = Zeroizing::new(
            BASE64
                .decode(text.trim())
                .map_err(|_| ExtractionError::Base64Invalid)?,
        );
        Self::from_bytes(&decoded)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// Never print key bytes, even in debug output.
impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Normalize a decoded key container into a [`SymmetricKey`].
///
/// The nested shape (`symmetricKey → key → data`) is recognized structurally:
/// if the `symmetricKey` value is a dictionary it must carry the full nested
/// path, otherwise the value itself is taken as the key leaf (flat shape).
///
/// # Errors
///
/// - [`ExtractionError::MissingField`] if `symmetricKey` is absent or empty
/// - [`ExtractionError::InvalidShape`] if the nested path is malformed or the
///   leaf is neither bytes nor a string
/// - [`ExtractionError::Base64Invalid`] if a string leaf fails base64 decoding
/// - [`ExtractionError::WrongLength`] if the material is not [`KEY_LEN`] bytes
pub fn extract_symmetric_key(container: &plist::Value) -> Result<SymmetricKey, ExtractionError> {
    let root = container
        .as_dictionary()
        .ok_or(ExtractionError::InvalidShape)?;
    let field = root
        .get("symmetricKey")
        .ok_or(ExtractionError::MissingField)?;

    let leaf = match field {
        plist::Value::Dictionary(outer) => {
            let inner = outer
                .get("key")
                .and_then(plist::Value::as_dictionary)
                .ok_or(ExtractionError::InvalidShape)?;
            inner.get("data").ok_or(ExtractionError::InvalidShape)?
        }
        other => other,
    };

    match leaf {
        plist::Value::Data(bytes) if bytes.is_empty() => Err(ExtractionError::MissingField),
        plist::Value::Data(bytes) => SymmetricKey::from_bytes(bytes),
        plist::Value::String(text) if text.is_empty() => Err(ExtractionError::MissingField),
        plist::Value::String(text) => SymmetricKey::from_base64(text),
        _ => Err(ExtractionError::InvalidShape),
    }
}

/// Returned by [`KeyRing::install`] when a group key would be replaced with
/// different bytes. Keys are write-once per run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{group} key is already installed with different bytes")]
pub struct KeyConflict {
    pub group: KeyGroup,
}

/// The two per-run key slots, owned by the pipeline instance.
///
/// Each slot is populated at most once per run; re-installing the same bytes
/// is a no-op, re-installing different bytes is a [`KeyConflict`]. Lookups
/// take `&self`, so cache files sharing a group can decrypt concurrently.
#[derive(Debug, Default)]
pub struct KeyRing {
    fmip: Option<SymmetricKey>,
    fmf: Option<SymmetricKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, group: KeyGroup, key: SymmetricKey) -> Result<(), KeyConflict> {
        let slot = match group {
            KeyGroup::Fmip => &mut self.fmip,
            KeyGroup::Fmf => &mut self.fmf,
        };
        match slot {
            Some(existing) if *existing != key => Err(KeyConflict { group }),
            _ => {
                *slot = Some(key);
                Ok(())
            }
        }
    }

    pub fn get(&self, group: KeyGroup) -> Option<&SymmetricKey> {
        match group {
            KeyGroup::Fmip => self.fmip.as_ref(),
            KeyGroup::Fmf => self.fmf.as_ref(),
        }
    }

    pub fn contains(&self, group: KeyGroup) -> bool {
        self.get(group).is_some()
    }
}
