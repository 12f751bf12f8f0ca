//! Content fingerprints for manifests and lock files.
//!
//! A manifest's fingerprint covers only its dependency declarations, so
//! edits to scripts, descriptions or formatting never trigger a rescan. A
//! lock file's fingerprint covers its raw bytes.
//!
//! Reads are fail-open: a file that is missing, unreadable or not valid JSON
//! reports "no change" and leaves the stored fingerprint alone. Editors that
//! save in several steps produce a follow-up event once the file is whole
//! again, and that event compares against the last good fingerprint.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde_json::Value;

use crate::config::Config;
use crate::resolver::ProjectRoot;

/// Manifest fields that declare dependencies.
pub const DEPENDENCY_FIELDS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Path-keyed cache of content hashes. Entries are never removed.
#[derive(Debug)]
pub struct FingerprintStore {
    entries: DashMap<PathBuf, blake3::Hash>,
    manifest_file: String,
    lock_files: Vec<String>,
}

impl FingerprintStore {
    pub fn new(config: &Config) -> Self {
        Self {
            entries: DashMap::new(),
            manifest_file: config.manifest_file.clone(),
            lock_files: config.lock_files.clone(),
        }
    }

    /// Re-read `path` and report whether its fingerprint differs from the
    /// stored one, storing the new fingerprint if so.
    ///
    /// The first successful read of a path always reports a change.
    /// `false` only means "nothing to act on": it is also returned when the
    /// file cannot be read or parsed.
    pub fn has_changed(&self, path: &Path) -> bool {
        let Some(hash) = self.compute(path) else {
            return false;
        };

        match self.entries.insert(path.to_path_buf(), hash) {
            Some(previous) => previous != hash,
            None => true,
        }
    }

    /// Check the manifest and every lock file of a project.
    ///
    /// All files are checked so each fingerprint stays current; a change in
    /// any one of them is enough to report `true`.
    pub fn project_changed(&self, root: &ProjectRoot) -> bool {
        let mut changed = self.has_changed(&root.join(&self.manifest_file));
        for lock in &self.lock_files {
            changed |= self.has_changed(&root.join(lock));
        }
        changed
    }

    /// Stored fingerprint for a path, if one was ever computed.
    pub fn get(&self, path: &Path) -> Option<blake3::Hash> {
        self.entries.get(path).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compute(&self, path: &Path) -> Option<blake3::Hash> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("fingerprint skipped, cannot read {}: {e}", path.display());
                return None;
            }
        };

        let is_manifest = path
            .file_name()
            .is_some_and(|name| name == self.manifest_file.as_str());
        if is_manifest {
            dependency_hash(path, &bytes)
        } else {
            Some(blake3::hash(&bytes))
        }
    }
}

/// Hash the dependency declarations of a manifest.
fn dependency_hash(path: &Path, bytes: &[u8]) -> Option<blake3::Hash> {
    let manifest: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("fingerprint skipped, {} is not valid JSON: {e}", path.display());
            return None;
        }
    };
    let object = manifest.as_object()?;

    let mut hasher = blake3::Hasher::new();
    for field in DEPENDENCY_FIELDS {
        let value = object.get(field).unwrap_or(&Value::Null);
        hasher.update(field.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }
    Some(hasher.finalize())
}
