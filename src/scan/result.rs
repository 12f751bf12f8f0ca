use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyzer::PackageNode;
use crate::resolver::ProjectRoot;

/// Outcome of one successful scan cycle. Replaced wholesale by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    missing: Vec<PackageNode>,
    invalid: Vec<PackageNode>,
    extraneous: Vec<PackageNode>,
    has_problems: bool,
}

impl ScanResult {
    pub fn new(
        missing: Vec<PackageNode>,
        invalid: Vec<PackageNode>,
        extraneous: Vec<PackageNode>,
    ) -> Self {
        let has_problems = !(missing.is_empty() && invalid.is_empty() && extraneous.is_empty());
        Self {
            missing,
            invalid,
            extraneous,
            has_problems,
        }
    }

    pub fn missing(&self) -> &[PackageNode] {
        &self.missing
    }

    pub fn invalid(&self) -> &[PackageNode] {
        &self.invalid
    }

    pub fn extraneous(&self) -> &[PackageNode] {
        &self.extraneous
    }

    pub fn has_problems(&self) -> bool {
        self.has_problems
    }

    pub fn problem_count(&self) -> usize {
        self.missing.len() + self.invalid.len() + self.extraneous.len()
    }

    /// Missing or invalid packages break the project; extraneous ones only
    /// waste space.
    pub fn has_errors(&self) -> bool {
        !self.missing.is_empty() || !self.invalid.is_empty()
    }
}

/// What a closed session hands to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: u64,
    /// Distinct projects triggered during the session.
    pub projects_scanned: usize,
    /// Only the projects whose latest result has problems.
    pub results: BTreeMap<ProjectRoot, ScanResult>,
}

impl SessionReport {
    pub fn is_clean(&self) -> bool {
        self.results.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.results.values().map(ScanResult::problem_count).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.results.values().any(ScanResult::has_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> PackageNode {
        PackageNode {
            name: name.to_string(),
            installed_version: Some("1.0.0".to_string()),
            required_specs: Vec::new(),
            location: format!("node_modules/{name}"),
        }
    }

    #[test]
    fn test_has_problems_is_derived() {
        assert!(!ScanResult::new(vec![], vec![], vec![]).has_problems());

        let extraneous_only = ScanResult::new(vec![], vec![], vec![node("b")]);
        assert!(extraneous_only.has_problems());
        assert!(!extraneous_only.has_errors());
        assert_eq!(extraneous_only.problem_count(), 1);
    }

    #[test]
    fn test_report_serializes_with_path_keys() {
        let mut results = BTreeMap::new();
        results.insert(
            ProjectRoot::from_dir("/p"),
            ScanResult::new(vec![], vec![node("a")], vec![]),
        );
        let report = SessionReport {
            session: 1,
            projects_scanned: 2,
            results,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["projectsScanned"], 2);
        assert_eq!(json["results"]["/p"]["invalid"][0]["name"], "a");
        assert_eq!(json["results"]["/p"]["hasProblems"], true);
        assert!(report.has_errors());
    }
}
