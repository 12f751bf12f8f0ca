//! Human-readable and JSON rendering of session reports.

use std::path::{Path, PathBuf};

use owo_colors::{OwoColorize, Stream};

use crate::analyzer::PackageNode;
use crate::error::Result;
use crate::resolver::ProjectRoot;
use crate::scan::{NotificationSink, ScanResult, SessionReport};

/// How a project is named in output: its path relative to the watched
/// directory, or the directory's own name when it is the watched directory.
pub fn project_label(root: &ProjectRoot, watched: &Path) -> String {
    let path = root.as_path();
    match path.strip_prefix(watched) {
        Ok(relative) if relative.as_os_str().is_empty() => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        Ok(relative) => relative.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// `Found 2 problems in "web": 1 invalid versions; 1 extraneous`
pub fn summary_line(label: &str, result: &ScanResult) -> String {
    let mut parts = Vec::new();
    if !result.missing().is_empty() {
        parts.push(format!("{} missing", result.missing().len()));
    }
    if !result.invalid().is_empty() {
        parts.push(format!("{} invalid versions", result.invalid().len()));
    }
    if !result.extraneous().is_empty() {
        parts.push(format!("{} extraneous", result.extraneous().len()));
    }
    format!(
        "Found {} in \"{label}\": {}",
        plural(result.problem_count(), "problem"),
        parts.join("; ")
    )
}

/// Per-category tree of the packages behind a result.
pub fn detail_tree(label: &str, result: &ScanResult) -> String {
    let sections: Vec<(&str, &[PackageNode])> = [
        ("Missing", result.missing()),
        ("Invalid", result.invalid()),
        ("Extraneous", result.extraneous()),
    ]
    .into_iter()
    .filter(|(_, nodes)| !nodes.is_empty())
    .collect();

    let mut out = format!("Project [{label}]\n");
    for (i, (title, nodes)) in sections.iter().enumerate() {
        let last_section = i + 1 == sections.len();
        let (branch, indent) = if last_section {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(&format!("{branch}{title} ({})\n", nodes.len()));

        for (j, node) in nodes.iter().enumerate() {
            let leaf = if j + 1 == nodes.len() { "└── " } else { "├── " };
            out.push_str(&format!("{indent}{leaf}{}", node.pkgid()));
            if *title == "Invalid" && !node.required_specs.is_empty() {
                out.push_str(&format!(" (required {})", node.required_specs.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

/// Full console text for a report. Errors are red, extraneous-only
/// warnings yellow, when stdout supports colour.
pub fn render_report(report: &SessionReport, watched: &Path) -> String {
    if report.is_clean() {
        let clean = "No dependency problems found";
        return format!("{}\n", clean.if_supports_color(Stream::Stdout, |t| t.green()));
    }

    let mut out = String::new();
    for (root, result) in &report.results {
        let label = project_label(root, watched);
        let summary = summary_line(&label, result);
        if result.has_errors() {
            let styled = summary.if_supports_color(Stream::Stdout, |t| t.red().bold().to_string());
            out.push_str(&styled.to_string());
        } else {
            let styled = summary.if_supports_color(Stream::Stdout, |t| t.yellow().to_string());
            out.push_str(&styled.to_string());
        }
        out.push('\n');
        out.push_str(&detail_tree(&label, result));
    }
    out
}

pub fn report_json(report: &SessionReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Prints every report to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    watched: PathBuf,
    json: bool,
}

impl ConsoleSink {
    pub fn new(watched: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            watched: watched.into(),
            json,
        }
    }

    pub fn render(&self, report: &SessionReport) -> Result<String> {
        if self.json {
            report_json(report)
        } else {
            Ok(render_report(report, &self.watched))
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, report: SessionReport) {
        match self.render(&report) {
            Ok(text) => println!("{}", text.trim_end()),
            Err(e) => tracing::warn!("failed to render session {}: {e}", report.session),
        }
    }
}
