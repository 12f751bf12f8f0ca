//! Dependency-tree analysis.
//!
//! A scan asks an [`Analyzer`] three independent questions about one
//! project: which required packages are missing, which installed packages
//! have the wrong version, and which installed packages nothing requires.
//! Analyzers are opened per scan cycle through an [`AnalyzerFactory`] and
//! dropped at the end of the cycle, so they may cache the loaded tree
//! without pinning it for the life of the process.

pub mod node_modules;
pub mod range;
pub mod tree;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::resolver::ProjectRoot;

pub use node_modules::{NodeModulesAnalyzer, NodeModulesFactory};

/// A package reported by an analyzer query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageNode {
    pub name: String,
    /// Installed version, `None` for packages that are not installed.
    pub installed_version: Option<String>,
    /// Specs of the edges this report is about (e.g. the ranges an invalid
    /// package fails to satisfy).
    pub required_specs: Vec<String>,
    /// Path relative to the project root, e.g. `node_modules/a`.
    pub location: String,
}

impl PackageNode {
    /// npm package id: `name@version`, or just `name` when not installed.
    pub fn pkgid(&self) -> String {
        match &self.installed_version {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pkgid())
    }
}

/// The three queries a scan cycle runs concurrently against one project.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Required but absent.
    async fn missing(&self) -> Result<Vec<PackageNode>>;
    /// Present but not satisfying an edge that requires it.
    async fn invalid(&self) -> Result<Vec<PackageNode>>;
    /// Present but not reachable from the project root.
    async fn extraneous(&self) -> Result<Vec<PackageNode>>;
}

/// Opens an analyzer for a project root.
pub trait AnalyzerFactory: Send + Sync {
    fn open(&self, root: &ProjectRoot) -> Arc<dyn Analyzer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkgid() {
        let installed = PackageNode {
            name: "@scope/a".to_string(),
            installed_version: Some("2.0.0".to_string()),
            required_specs: vec!["^1.0.0".to_string()],
            location: "node_modules/@scope/a".to_string(),
        };
        assert_eq!(installed.pkgid(), "@scope/a@2.0.0");
        assert_eq!(installed.to_string(), "@scope/a@2.0.0");

        let missing = PackageNode {
            installed_version: None,
            ..installed
        };
        assert_eq!(missing.pkgid(), "@scope/a");
    }
}
