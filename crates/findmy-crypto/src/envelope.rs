//! ChaCha20-Poly1305 envelope framing used by FindMy cache files.
//!
//! One envelope carries one AEAD-protected message laid out as
//! `nonce(12) ‖ ciphertext ‖ tag(16)` with empty associated data. The tag is
//! the trailing 16 bytes of the buffer handed to the primitive, per the
//! RustCrypto convention, so this module only splits off the nonce.
//!
//! [`open`] is pure and stateless: it is safe to call concurrently over
//! disjoint buffers sharing a key.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use thiserror::Error;

use crate::key::SymmetricKey;

/// Byte length of the envelope nonce (96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Smallest well-formed envelope: a nonce and the tag over an empty ciphertext.
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN + TAG_LEN;

/// Errors produced by envelope open/seal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AeadError {
    /// The buffer cannot be framed: shorter than [`MIN_ENVELOPE_LEN`] on open,
    /// or a plaintext too large for the primitive on seal.
    #[error("envelope framing invalid (need at least {MIN_ENVELOPE_LEN} bytes)")]
    Malformed,

    /// Authentication failed. Deliberately undifferentiated: a wrong key, a
    /// tampered ciphertext, and a tampered tag are indistinguishable to the
    /// caller so partial-validity information never leaks.
    #[error("authentication failed (wrong key or tampered envelope)")]
    AuthenticationFailed,
}

/// Authenticated decryption of one envelope.
///
/// # Errors
///
/// [`AeadError::Malformed`] if `envelope` is shorter than
/// [`MIN_ENVELOPE_LEN`]; [`AeadError::AuthenticationFailed`] on any primitive
/// failure.
pub fn open(envelope: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, AeadError> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(AeadError::Malformed);
    }
    let (nonce, ciphertext_and_tag) = envelope.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext_and_tag)
        .map_err(|_| AeadError::AuthenticationFailed)
}

/// Seal `plaintext` into the envelope framing with an explicit nonce.
///
/// The inverse of [`open`]; used for fixture generation and round-trip tests.
/// Nonce selection is the caller's responsibility.
pub fn seal(
    plaintext: &[u8],
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext_and_tag = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| AeadError::Malformed)?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext_and_tag.len());
    envelope.extend_from_slice(nonce);
    envelope.extend_from_slice(&ciphertext_and_tag);
    Ok(envelope)
}
