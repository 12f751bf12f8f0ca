mod check;
mod watch;

pub use check::cmd_check;
pub use watch::cmd_watch;

use std::path::{Path, PathBuf};

use crate::error::{PkgiError, Result};

/// Absolute form of the directory a command operates on.
fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(PkgiError::UnresolvableRoot(dir.to_path_buf()));
    }
    Ok(dir.canonicalize()?)
}
