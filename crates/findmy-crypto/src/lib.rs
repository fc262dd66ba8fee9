//! Decryption of FindMy encrypted cache containers.
//!
//! FindMy persists its caches (`Items.data`, `Devices.data`,
//! `FriendCacheData.data`, ...) as binary plists whose root dictionary holds a
//! single `encryptedData` byte field. That field is an AEAD envelope:
//!
//! `nonce(12) ‖ ciphertext ‖ tag(16)`
//!
//! sealed with ChaCha20-Poly1305 and no associated data. Two independent key
//! groups exist — FMIP (Find My iPhone) and FMF (Find My Friends) — each with
//! its own 32-byte symmetric key stored in a separate key container
//! (`FMIPDataManager.bplist` / `FMFDataManager.bplist`) in one of two observed
//! shapes (see [`key`]).
//!
//! This crate supplies:
//! - [`key`]: key-container shape normalization into a 32-byte [`SymmetricKey`]
//! - [`envelope`]: authenticated open/seal of the envelope framing
//! - [`classify`]: recursive sniffing of decrypted plaintext (nested plist,
//!   JSON object, or opaque bytes)
//! - [`render`]: depth-limited human-readable rendering of decoded values
//! - [`pipeline`]: the per-file decode → open → classify orchestration
//!
//! The crate is synchronous, pure, and filesystem-free: callers supply
//! container bytes and consume structured results. Plist encoding/decoding is
//! delegated to the `plist` crate throughout.

pub mod classify;
pub mod envelope;
pub mod key;
pub mod pipeline;
pub mod render;


pub use classify::{classify, Classification};
pub use envelope::{AeadError, MIN_ENVELOPE_LEN, NONCE_LEN, TAG_LEN};
pub use key::{
    extract_symmetric_key, ExtractionError, KeyConflict, KeyGroup, KeyRing, SymmetricKey, KEY_LEN,
};
pub use pipeline::{
    decrypt_cache_with_key, CacheDecryptor, DecryptedCache, PipelineError, ENCRYPTED_DATA_FIELD,
};
pub use render::{render_value, RenderError, MAX_RENDER_DEPTH};
