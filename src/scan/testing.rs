//! Scripted analyzers for scan tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::analyzer::{Analyzer, AnalyzerFactory, PackageNode};
use crate::error::{PkgiError, Result};
use crate::resolver::ProjectRoot;

/// Factory whose analyzers report a fixed set of invalid packages per root.
#[derive(Default)]
pub struct ScriptedFactory {
    opens: AtomicUsize,
    failures: AtomicUsize,
    panics: AtomicUsize,
    default_invalid: Vec<String>,
    invalid: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl ScriptedFactory {
    pub fn clean() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_invalid(name: &str) -> Arc<Self> {
        Arc::new(Self {
            default_invalid: vec![name.to_string()],
            ..Self::default()
        })
    }

    /// Report `names` as invalid for `root` only.
    pub fn set_invalid(&self, root: &str, names: &[&str]) {
        self.invalid.lock().insert(
            PathBuf::from(root),
            names.iter().map(|name| name.to_string()).collect(),
        );
    }

    /// Make the next `cycles` opened analyzers fail every query.
    pub fn fail_next(&self, cycles: usize) {
        self.failures.store(cycles, Ordering::SeqCst);
    }

    /// Make the next `cycles` opened analyzers panic in every query.
    pub fn panic_next(&self, cycles: usize) {
        self.panics.store(cycles, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AnalyzerFactory for ScriptedFactory {
    fn open(&self, root: &ProjectRoot) -> Arc<dyn Analyzer> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let panic = self
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let invalid = self
            .invalid
            .lock()
            .get(root.as_path())
            .cloned()
            .unwrap_or_else(|| self.default_invalid.clone());
        Arc::new(ScriptedAnalyzer {
            root: root.as_path().to_path_buf(),
            fail,
            panic,
            invalid,
        })
    }
}

struct ScriptedAnalyzer {
    root: PathBuf,
    fail: bool,
    panic: bool,
    invalid: Vec<String>,
}

impl ScriptedAnalyzer {
    fn check(&self) -> Result<()> {
        if self.panic {
            panic!("scripted panic in {}", self.root.display());
        }
        if self.fail {
            return Err(PkgiError::Analyzer {
                root: self.root.clone(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn missing(&self) -> Result<Vec<PackageNode>> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn invalid(&self) -> Result<Vec<PackageNode>> {
        self.check()?;
        Ok(self
            .invalid
            .iter()
            .map(|name| PackageNode {
                name: name.clone(),
                installed_version: Some("2.0.0".to_string()),
                required_specs: vec!["^1.0.0".to_string()],
                location: format!("node_modules/{name}"),
            })
            .collect())
    }

    async fn extraneous(&self) -> Result<Vec<PackageNode>> {
        self.check()?;
        Ok(Vec::new())
    }
}
