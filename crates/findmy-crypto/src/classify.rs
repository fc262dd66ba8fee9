//! Classification of decrypted cache plaintext.
//!
//! FindMy cache plaintext is one of three things in practice: another binary
//! plist (most caches), a JSON object (some server-sourced payloads), or
//! opaque bytes. Classification sniffs the leading marker and decodes
//! accordingly; a marker with an undecodable payload is demoted to
//! [`Classification::UnparsedBytes`] rather than treated as fatal, since the
//! decryption itself already succeeded.

use std::io::Cursor;

/// Magic prefix of a binary plist payload.
pub const BPLIST_MAGIC: &[u8] = b"bplist";

/// The decoded form of one decrypted plaintext.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Plaintext is itself a structured container (binary plist).
    NestedContainer(plist::Value),
    /// Plaintext is a UTF-8 JSON object.
    JsonText(serde_json::Value),
    /// No recognized marker; the caller decides how to interpret the bytes.
    PlainBytes,
    /// A marker was present but the payload did not decode.
    UnparsedBytes { error: String },
}

impl Classification {
    /// Short tag for reports and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::NestedContainer(_) => "plist",
            Classification::JsonText(_) => "json",
            Classification::PlainBytes => "binary",
            Classification::UnparsedBytes { .. } => "unparsed",
        }
    }

    /// Output filename suffix for the conventional caller-side persistence
    /// policy: re-encoded plists as `<file>.decrypted.plist`, everything else
    /// as raw bytes.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Classification::NestedContainer(_) => "decrypted.plist",
            _ => "decrypted.bin",
        }
    }
}

/// Classify one decrypted plaintext.
///
/// - a [`BPLIST_MAGIC`] prefix is decoded through the plist codec;
/// - a leading `{` is decoded as UTF-8 then parsed as JSON;
/// - anything else is [`Classification::PlainBytes`].
///
/// Decode failures after a recognized marker are recoverable
/// ([`Classification::UnparsedBytes`]); this function never fails.
pub fn classify(bytes: &[u8]) -> Classification {
    if bytes.starts_with(BPLIST_MAGIC) {
        return match plist::Value::from_reader(Cursor::new(bytes)) {
            Ok(value) => Classification::NestedContainer(value),
            Err(err) => Classification::UnparsedBytes {
                error: err.to_string(),
            },
        };
    }

    if bytes.first() == Some(&b'{') {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                return Classification::UnparsedBytes {
                    error: err.to_string(),
                }
            }
        };
        return match serde_json::from_str(text) {
            Ok(value) => Classification::JsonText(value),
            Err(err) => Classification::UnparsedBytes {
                error: err.to_string(),
            },
        };
    }

    Classification::PlainBytes
}
