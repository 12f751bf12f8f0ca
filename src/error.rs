use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("filesystem watcher error: {0}")]
    WatcherError(String),

    #[error("cannot resolve a project root for '{}'", .0.display())]
    UnresolvableRoot(PathBuf),

    #[error("manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("invalid manifest '{}': {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("analysis of '{}' failed: {message}", .root.display())]
    Analyzer { root: PathBuf, message: String },

    #[error("scan of '{}' was abandoned before it completed", .0.display())]
    ScanAbandoned(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PkgiError>;
