use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// File name of the change cache, stored alongside the catalog output.
pub const CACHE_FILE_NAME: &str = ".extract_cache.json";

/// Per-file content fingerprints for incremental extraction.
///
/// Loaded once at the start of an incremental run, consulted per file to
/// decide skip-vs-rescan, and fully rewritten at the end with fresh
/// fingerprints for every file visited. Files that vanished from the source
/// tree simply never make it into the next cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeCache {
    entries: BTreeMap<String, String>,
}

impl ChangeCache {
    /// Load the cache; a missing or unreadable file yields an empty cache so
    /// the run degrades to a full rescan instead of failing.
    pub fn load(path: &Path) -> Self {
        let entries = fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self { entries }
    }

    /// Rewrite the cache file with the entries recorded this run.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Whether `rel_path` was recorded with this exact fingerprint.
    pub fn is_unchanged(&self, rel_path: &str, fingerprint: &str) -> bool {
        self.entries.get(rel_path).map(String::as_str) == Some(fingerprint)
    }

    pub fn record(&mut self, rel_path: impl Into<String>, fingerprint: impl Into<String>) {
        self.entries.insert(rel_path.into(), fingerprint.into());
    }

    /// Whether `rel_path` was visited during the run that built this cache.
    pub fn contains(&self, rel_path: &str) -> bool {
        self.entries.contains_key(rel_path)
    }

    /// The fingerprint recorded for `rel_path`, if any.
    pub fn fingerprint_of(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SHA-256 fingerprint of a file's raw bytes, streamed.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
