//! Offline dump tool for FindMy encrypted cache files.
//!
//! This crate is the thin I/O shell around `findmy-crypto`: it owns key-file
//! loading (including hex dumps pasted from another machine), discovery of
//! cache files under a FindMy container root, the group→file mapping, console
//! reporting, and persistence of decrypted outputs next to their inputs as
//! `<file>.decrypted.plist` / `<file>.decrypted.bin`. The core stays
//! bytes-in/bytes-out; everything filesystem-shaped lives here.

pub mod cli;

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use findmy_crypto::{
    extract_symmetric_key, render_value, CacheDecryptor, Classification, DecryptedCache, KeyGroup,
    SymmetricKey,
};
use serde::Serialize;
use walkdir::WalkDir;

/// Directory holding the FMIP-group caches, relative to the FindMy root.
pub const FMIP_CACHE_DIR: &str = "com.apple.findmy.fmipcore";
/// Directory holding the FMF-group caches, relative to the FindMy root.
pub const FMF_CACHE_DIR: &str = "com.apple.findmy.fmfcore";

/// Cache files governed by the FMIP key.
pub const FMIP_CACHE_FILES: &[&str] = &[
    "SafeLocations.data",
    "Items.data",
    "Devices.data",
    "FamilyMembers.data",
    "ItemGroups.data",
    "Owner.data",
];

/// Cache files governed by the FMF key.
pub const FMF_CACHE_FILES: &[&str] = &["FriendCacheData.data"];

/// One cache file queued for decryption under a specific key group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub group: KeyGroup,
}

/// Outcome of one cache file.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub group: &'static str,
    #[serde(flatten)]
    pub status: Outcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Decrypted {
        kind: &'static str,
        plaintext_len: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rendered: Option<String>,
    },
    Failed {
        reason: String,
    },
}

/// Per-run processing knobs, owned by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Persist decrypted outputs next to the inputs.
    pub write: bool,
    /// Carry a human-readable rendering of structured payloads in the
    /// outcome (the recursive plist pretty-print, or pretty JSON).
    pub render: bool,
}

impl FileOutcome {
    pub fn is_decrypted(&self) -> bool {
        matches!(self.status, Outcome::Decrypted { .. })
    }
}

/// Decode a key container plist and extract its symmetric key.
pub fn key_from_container_bytes(bytes: &[u8]) -> Result<SymmetricKey> {
    let value =
        plist::Value::from_reader(Cursor::new(bytes)).context("decode key container plist")?;
    Ok(extract_symmetric_key(&value)?)
}

/// Load a key from a key container file (`FMIPDataManager.bplist` style).
pub fn load_key_from_file(path: &Path) -> Result<SymmetricKey> {
    let bytes =
        fs::read(path).with_context(|| format!("read key container {}", path.display()))?;
    key_from_container_bytes(&bytes)
        .with_context(|| format!("extract key from {}", path.display()))
}

/// Load a key from a hex dump of a key container, as produced by
/// `xxd -p FMIPDataManager.bplist | tr -d '\n'`. Whitespace is ignored.
pub fn key_from_hex_dump(text: &str) -> Result<SymmetricKey> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("decode hex key container dump")?;
    key_from_container_bytes(&bytes)
}

/// Find cache files under a FindMy container root.
///
/// The fixed `com.apple.findmy.fmipcore` / `fmfcore` layout is tried first;
/// when neither directory is present the root is scanned recursively for the
/// known cache file names, since pulled dumps are often re-rooted.
pub fn discover_jobs(root: &Path) -> Vec<Job> {
    let mut jobs = Vec::new();

    let groups: [(&str, &[&str], KeyGroup); 2] = [
        (FMIP_CACHE_DIR, FMIP_CACHE_FILES, KeyGroup::Fmip),
        (FMF_CACHE_DIR, FMF_CACHE_FILES, KeyGroup::Fmf),
    ];

    for (dir, names, group) in groups {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }
        for name in names {
            let path = base.join(name);
            if path.is_file() {
                jobs.push(Job { path, group });
            }
        }
    }

    if jobs.is_empty() {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let group = if FMIP_CACHE_FILES.contains(&name) {
                KeyGroup::Fmip
            } else if FMF_CACHE_FILES.contains(&name) {
                KeyGroup::Fmf
            } else {
                continue;
            };
            jobs.push(Job {
                path: entry.path().to_path_buf(),
                group,
            });
        }
    }

    jobs
}

/// Decrypt every job, applying the run's write/render policy.
///
/// A failure for one file never aborts the run; it is recorded in that file's
/// outcome and iteration continues.
pub fn process_jobs(
    decryptor: &CacheDecryptor,
    jobs: &[Job],
    options: ProcessOptions,
) -> Vec<FileOutcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        outcomes.push(process_job(decryptor, job, options));
    }
    outcomes
}

fn process_job(decryptor: &CacheDecryptor, job: &Job, options: ProcessOptions) -> FileOutcome {
    let path = job.path.display().to_string();
    let group = job.group.as_str();

    let failed = |reason: String| FileOutcome {
        path: path.clone(),
        group,
        status: Outcome::Failed { reason },
    };

    let bytes = match fs::read(&job.path) {
        Ok(bytes) => bytes,
        Err(err) => return failed(format!("read cache file: {err}")),
    };

    let cache = match decryptor.decrypt_cache(&bytes, job.group) {
        Ok(cache) => cache,
        Err(err) => return failed(err.to_string()),
    };

    let output = if options.write {
        match write_output(&job.path, &cache) {
            Ok(out) => Some(out.display().to_string()),
            Err(err) => return failed(format!("write decrypted output: {err:#}")),
        }
    } else {
        None
    };

    let rendered = if options.render {
        render_classified(&cache.classified)
    } else {
        None
    };

    FileOutcome {
        path,
        group,
        status: Outcome::Decrypted {
            kind: cache.classified.kind(),
            plaintext_len: cache.plaintext.len(),
            output,
            rendered,
        },
    }
}

fn render_classified(classified: &Classification) -> Option<String> {
    match classified {
        Classification::NestedContainer(value) => Some(match render_value(value) {
            Ok(rendered) => rendered,
            Err(err) => format!("<render failed: {err}>"),
        }),
        Classification::JsonText(value) => serde_json::to_string_pretty(value).ok(),
        _ => None,
    }
}

/// Persist one decrypted cache next to its input.
///
/// Nested containers are re-encoded as a binary plist at
/// `<file>.decrypted.plist`; all other classifications write the raw
/// plaintext to `<file>.decrypted.bin`.
pub fn write_output(input: &Path, cache: &DecryptedCache) -> Result<PathBuf> {
    let path = path_with_suffix(input, cache.classified.output_extension());
    match &cache.classified {
        Classification::NestedContainer(value) => {
            let file = fs::File::create(&path)
                .with_context(|| format!("create {}", path.display()))?;
            value
                .to_writer_binary(file)
                .with_context(|| format!("encode {}", path.display()))?;
        }
        _ => {
            fs::write(&path, &cache.plaintext)
                .with_context(|| format!("write {}", path.display()))?;
        }
    }
    Ok(path)
}

fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{suffix}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_appended_after_the_existing_extension() {
        let out = path_with_suffix(Path::new("/tmp/Items.data"), "decrypted.plist");
        assert_eq!(out, PathBuf::from("/tmp/Items.data.decrypted.plist"));
    }

    #[test]
    fn hex_dump_whitespace_is_ignored() {
        // Not a valid plist, but hex decoding itself must tolerate the
        // line-wrapped `xxd -p` format.
        let err = key_from_hex_dump("62 70 6c\n69 73 74").unwrap_err();
        assert!(err.to_string().contains("decode key container plist"));
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        let err = key_from_hex_dump("abc").unwrap_err();
        assert!(err.to_string().contains("hex"));
    }
}
