#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// An isolated directory of npm projects, plus a way to run the `pkgi`
/// binary against it.
pub struct PkgiTest {
    pub temp_dir: TempDir,
    binary_path: PathBuf,
}

impl PkgiTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        PkgiTest {
            temp_dir,
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_pkgi")),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.binary_path)
            .args(args)
            .current_dir(self.temp_dir.path())
            .env_remove("PKGI_LOG")
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute pkgi command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "Command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run a command expected to exit with `code`; returns stdout.
    pub fn run_with_code(&self, args: &[&str], code: i32) -> String {
        let output = self.run(args);
        assert_eq!(
            output.status.code(),
            Some(code),
            "Command {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Write `<project>/package.json`.
    pub fn write_manifest(&self, project: &str, json: &str) -> PathBuf {
        self.write(&format!("{project}/package.json"), json)
    }

    /// Install `<project>/node_modules/<name>` at `version`.
    pub fn install(&self, project: &str, name: &str, version: &str) -> PathBuf {
        self.write(
            &format!("{project}/node_modules/{name}/package.json"),
            &format!(r#"{{"name": "{name}", "version": "{version}"}}"#),
        )
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// The canonical form of a project directory, as reports key it.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.path()
            .join(project)
            .canonicalize()
            .expect("Failed to canonicalize project directory")
    }
}

/// `/p` requires `a@^1.0.0`, has `a@2.0.0` installed plus an untracked `b`.
pub fn broken_project(test: &PkgiTest, project: &str) {
    test.write_manifest(
        project,
        r#"{"name": "p", "version": "1.0.0", "dependencies": {"a": "^1.0.0"}}"#,
    );
    test.install(project, "a", "2.0.0");
    test.install(project, "b", "1.0.0");
}

/// A project whose installed tree matches its manifest.
pub fn healthy_project(test: &PkgiTest, project: &str) {
    test.write_manifest(
        project,
        r#"{"name": "ok", "dependencies": {"a": "^1.0.0"}, "devDependencies": {"t": "~2.1.0"}}"#,
    );
    test.install(project, "a", "1.4.0");
    test.install(project, "t", "2.1.3");
}
