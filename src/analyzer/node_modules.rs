use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::analyzer::tree::PackageTree;
use crate::analyzer::{Analyzer, AnalyzerFactory, PackageNode};
use crate::error::{PkgiError, Result};
use crate::resolver::ProjectRoot;

/// Analyzer over the on-disk `node_modules` tree of one project.
///
/// The tree is loaded lazily by whichever query runs first and shared by
/// the other two, so one scan cycle reads the disk once.
pub struct NodeModulesAnalyzer {
    root: PathBuf,
    manifest_file: String,
    tree: OnceCell<Arc<PackageTree>>,
}

impl NodeModulesAnalyzer {
    pub fn new(root: &ProjectRoot, manifest_file: impl Into<String>) -> Self {
        Self {
            root: root.as_path().to_path_buf(),
            manifest_file: manifest_file.into(),
            tree: OnceCell::new(),
        }
    }

    async fn tree(&self) -> Result<Arc<PackageTree>> {
        self.tree
            .get_or_try_init(|| async {
                let root = self.root.clone();
                let manifest_file = self.manifest_file.clone();
                let tree = tokio::task::spawn_blocking(move || {
                    PackageTree::load(&root, &manifest_file)
                })
                .await
                .map_err(|e| PkgiError::Analyzer {
                    root: self.root.clone(),
                    message: format!("tree loader panicked: {e}"),
                })??;
                tracing::debug!(
                    "loaded {} installed packages under {}",
                    tree.installed_count(),
                    self.root.display()
                );
                Ok::<_, PkgiError>(Arc::new(tree))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Analyzer for NodeModulesAnalyzer {
    async fn missing(&self) -> Result<Vec<PackageNode>> {
        Ok(self.tree().await?.missing())
    }

    async fn invalid(&self) -> Result<Vec<PackageNode>> {
        Ok(self.tree().await?.invalid())
    }

    async fn extraneous(&self) -> Result<Vec<PackageNode>> {
        Ok(self.tree().await?.extraneous())
    }
}

/// Opens a [`NodeModulesAnalyzer`] per project.
#[derive(Debug, Clone)]
pub struct NodeModulesFactory {
    manifest_file: String,
}

impl NodeModulesFactory {
    pub fn new(manifest_file: impl Into<String>) -> Self {
        Self {
            manifest_file: manifest_file.into(),
        }
    }
}

impl AnalyzerFactory for NodeModulesFactory {
    fn open(&self, root: &ProjectRoot) -> Arc<dyn Analyzer> {
        Arc::new(NodeModulesAnalyzer::new(root, self.manifest_file.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_queries_share_one_load() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("package.json"),
            r#"{"dependencies": {"a": "^1.0.0"}}"#,
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/a")).unwrap();
        fs::write(
            tmp.path().join("node_modules/a/package.json"),
            r#"{"version": "1.0.0"}"#,
        )
        .unwrap();

        let root = ProjectRoot::from_dir(tmp.path());
        let analyzer = NodeModulesFactory::new("package.json").open(&root);
        assert!(analyzer.missing().await.unwrap().is_empty());

        // Later disk changes are not seen by an analyzer that already loaded.
        fs::remove_dir_all(tmp.path().join("node_modules")).unwrap();
        assert!(analyzer.extraneous().await.unwrap().is_empty());
        assert!(analyzer.missing().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_every_query() {
        let tmp = TempDir::new().unwrap();
        let root = ProjectRoot::from_dir(tmp.path());
        let analyzer = NodeModulesAnalyzer::new(&root, "package.json");

        assert!(matches!(
            analyzer.missing().await,
            Err(PkgiError::ManifestNotFound(_))
        ));
        assert!(analyzer.invalid().await.is_err());
    }
}
