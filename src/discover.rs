//! Finding the projects under a directory.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{PkgiError, Result};
use crate::resolver::ProjectRoot;

/// Every directory under `dir` (inclusive) that holds a manifest, sorted.
///
/// Symlinks are not followed and `node_modules`, `.git` and configured
/// excluded directories are never entered. Unreadable subtrees are skipped.
pub fn discover_projects(dir: &Path, config: &Config) -> Result<Vec<ProjectRoot>> {
    if !dir.is_dir() {
        return Err(PkgiError::UnresolvableRoot(dir.to_path_buf()));
    }

    let mut roots = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !config.is_excluded_dir(&entry.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !config.is_manifest(&entry.file_name().to_string_lossy())
        {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            roots.push(ProjectRoot::from_dir(parent));
        }
    }

    roots.sort();
    roots.dedup();
    tracing::debug!("discovered {} project(s) under {}", roots.len(), dir.display());
    Ok(roots)
}
