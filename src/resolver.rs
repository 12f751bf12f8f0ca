//! Mapping changed paths to the project directory that owns them.
//!
//! Any path beneath an installed-packages directory belongs to the project
//! that owns that `node_modules`, so resolution strips the first
//! `node_modules` segment and everything after it before looking at the
//! filesystem.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{PkgiError, Result};

/// Name of the installed-packages directory.
pub const NODE_MODULES: &str = "node_modules";

/// Absolute directory that owns a dependency manifest.
///
/// Never a path beneath a `node_modules` directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectRoot(PathBuf);

impl ProjectRoot {
    /// Resolve the project root for an existing path.
    ///
    /// Strips any `node_modules` suffix; if what remains is a directory it is
    /// the root, otherwise its parent is. Fails when the result is not an
    /// existing directory.
    pub fn resolve(path: &Path) -> Result<Self> {
        let stripped = strip_node_modules(path);
        let root = if stripped.is_dir() {
            stripped
        } else {
            stripped
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| PkgiError::UnresolvableRoot(path.to_path_buf()))?
        };

        if !root.is_dir() {
            return Err(PkgiError::UnresolvableRoot(path.to_path_buf()));
        }
        Ok(ProjectRoot(root))
    }

    /// Root of the project containing a file that may no longer exist.
    ///
    /// Purely lexical: used for deletion events, when the filesystem can no
    /// longer tell a file from a directory. A path inside `node_modules`
    /// belongs to the directory holding that `node_modules`; any other path
    /// belongs to its parent.
    pub fn containing(file: &Path) -> Result<Self> {
        let stripped = strip_node_modules(file);
        let root = if is_project_root_path(file) {
            stripped.parent().map(Path::to_path_buf)
        } else {
            Some(stripped)
        };
        root.filter(|dir| !dir.as_os_str().is_empty())
            .map(ProjectRoot)
            .ok_or_else(|| PkgiError::UnresolvableRoot(file.to_path_buf()))
    }

    /// Wrap a directory already known to be a project root.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        ProjectRoot(dir.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Path of a file directly inside the root.
    pub fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl AsRef<Path> for ProjectRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Whether a path stays outside every `node_modules` directory.
///
/// Events inside installed packages never identify a project by themselves.
pub fn is_project_root_path(path: &Path) -> bool {
    !path.components().any(is_node_modules)
}

/// Drop the first `node_modules` segment and everything after it.
fn strip_node_modules(path: &Path) -> PathBuf {
    path.components()
        .take_while(|component| !is_node_modules(*component))
        .collect()
}

fn is_node_modules(component: Component<'_>) -> bool {
    matches!(component, Component::Normal(name) if name == NODE_MODULES)
}
