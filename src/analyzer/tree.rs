//! In-memory model of an installed `node_modules` tree.
//!
//! Loading reads the project manifest and every installed package's
//! manifest once; the three queries are then pure functions over the
//! loaded nodes and edges.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::analyzer::PackageNode;
use crate::analyzer::range::satisfies;
use crate::error::{PkgiError, Result};
use crate::resolver::NODE_MODULES;

/// The subset of a `package.json` the analyzer reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies_meta: BTreeMap<String, PeerMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct PeerMeta {
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Prod,
    Dev,
    Optional,
    Peer,
    PeerOptional,
}

impl EdgeKind {
    /// An unresolved edge of this kind is not a problem.
    fn allows_missing(self) -> bool {
        matches!(self, EdgeKind::Optional | EdgeKind::PeerOptional)
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    version: Option<String>,
    location: String,
    /// Symlinked packages are leaves: their own dependencies live elsewhere.
    link: bool,
}

#[derive(Debug)]
struct Edge {
    from: usize,
    name: String,
    spec: String,
    kind: EdgeKind,
    to: Option<usize>,
}

/// Loaded project tree. Node 0 is the project itself.
#[derive(Debug)]
pub struct PackageTree {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Resolved targets of each node's outgoing edges, indexed like `nodes`.
    children: Vec<Vec<usize>>,
}

impl PackageTree {
    /// Read the project manifest and everything installed beneath it.
    pub fn load(root: &Path, manifest_file: &str) -> Result<Self> {
        let manifest_path = root.join(manifest_file);
        if !manifest_path.is_file() {
            return Err(PkgiError::ManifestNotFound(manifest_path));
        }
        let root_manifest = read_manifest(&manifest_path)?;

        let mut loader = Loader {
            manifest_file,
            nodes: vec![Node {
                name: root_manifest.name.clone().unwrap_or_default(),
                version: root_manifest.version.clone(),
                location: String::new(),
                link: false,
            }],
            manifests: vec![root_manifest],
        };
        loader.walk(root, "");

        let mut tree = PackageTree {
            children: vec![Vec::new(); loader.nodes.len()],
            nodes: loader.nodes,
            edges: Vec::new(),
        };
        let by_location: HashMap<String, usize> = tree
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.location.clone(), idx))
            .collect();

        for (from, manifest) in loader.manifests.iter().enumerate() {
            if tree.nodes[from].link {
                continue;
            }
            for (name, (spec, kind)) in declared_edges(manifest, from == 0) {
                let to = resolve(&by_location, &tree.nodes[from].location, &name);
                if let Some(to) = to {
                    tree.children[from].push(to);
                }
                tree.edges.push(Edge {
                    from,
                    name,
                    spec,
                    kind,
                    to,
                });
            }
        }
        Ok(tree)
    }

    /// Number of installed packages (the project itself excluded).
    pub fn installed_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn missing(&self) -> Vec<PackageNode> {
        let mut missing: BTreeMap<String, PackageNode> = BTreeMap::new();
        for edge in &self.edges {
            if edge.to.is_some() || edge.kind.allows_missing() {
                continue;
            }
            let location = child_location(&self.nodes[edge.from].location, &edge.name);
            let node = missing
                .entry(location.clone())
                .or_insert_with(|| PackageNode {
                    name: edge.name.clone(),
                    installed_version: None,
                    required_specs: Vec::new(),
                    location,
                });
            if !node.required_specs.contains(&edge.spec) {
                node.required_specs.push(edge.spec.clone());
            }
        }
        missing.into_values().collect()
    }

    pub fn invalid(&self) -> Vec<PackageNode> {
        let mut failing: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for edge in &self.edges {
            let Some(to) = edge.to else {
                continue;
            };
            let version = self.nodes[to].version.as_deref().unwrap_or("");
            if !satisfies(&edge.spec, version) {
                let specs = failing.entry(to).or_default();
                if !specs.contains(&edge.spec) {
                    specs.push(edge.spec.clone());
                }
            }
        }
        failing
            .into_iter()
            .map(|(idx, specs)| self.describe(idx, specs))
            .collect()
    }

    pub fn extraneous(&self) -> Vec<PackageNode> {
        let mut reachable = HashSet::from([0]);
        let mut queue = VecDeque::from([0]);
        while let Some(idx) = queue.pop_front() {
            for &to in &self.children[idx] {
                if reachable.insert(to) {
                    queue.push_back(to);
                }
            }
        }

        (1..self.nodes.len())
            .filter(|idx| !reachable.contains(idx))
            .map(|idx| self.describe(idx, Vec::new()))
            .collect()
    }

    fn describe(&self, idx: usize, required_specs: Vec<String>) -> PackageNode {
        let node = &self.nodes[idx];
        PackageNode {
            name: node.name.clone(),
            installed_version: node.version.clone(),
            required_specs,
            location: node.location.clone(),
        }
    }
}

struct Loader<'a> {
    manifest_file: &'a str,
    nodes: Vec<Node>,
    manifests: Vec<Manifest>,
}

impl Loader<'_> {
    /// Visit `<dir>/node_modules`, in name order so locations come out sorted.
    fn walk(&mut self, dir: &Path, location: &str) {
        let modules = dir.join(NODE_MODULES);
        for name in sorted_entries(&modules) {
            if name.starts_with('.') {
                continue;
            }
            if name.starts_with('@') {
                for scoped in sorted_entries(&modules.join(&name)) {
                    if !scoped.starts_with('.') {
                        let full = format!("{name}/{scoped}");
                        self.visit(&modules.join(&full), &full, location);
                    }
                }
            } else {
                self.visit(&modules.join(&name), &name, location);
            }
        }
    }

    fn visit(&mut self, dir: &Path, name: &str, parent: &str) {
        let manifest_path = dir.join(self.manifest_file);
        let manifest = match read_manifest(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!("skipping {}: {e}", dir.display());
                return;
            }
        };
        let link = fs::symlink_metadata(dir).is_ok_and(|meta| meta.file_type().is_symlink());
        let location = child_location(parent, name);

        self.nodes.push(Node {
            name: name.to_string(),
            version: manifest.version.clone(),
            location: location.clone(),
            link,
        });
        self.manifests.push(manifest);

        if !link {
            self.walk(dir, &location);
        }
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content).map_err(|e| PkgiError::InvalidManifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn sorted_entries(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Outgoing edges of a manifest, keyed by dependency name.
///
/// Later groups override earlier ones, so a package listed both as a
/// regular and an optional dependency is optional.
fn declared_edges(manifest: &Manifest, is_root: bool) -> BTreeMap<String, (String, EdgeKind)> {
    let mut edges = BTreeMap::new();
    for (name, spec) in &manifest.peer_dependencies {
        let optional = manifest
            .peer_dependencies_meta
            .get(name)
            .is_some_and(|meta| meta.optional);
        let kind = if optional {
            EdgeKind::PeerOptional
        } else {
            EdgeKind::Peer
        };
        edges.insert(name.clone(), (spec.clone(), kind));
    }
    if is_root {
        for (name, spec) in &manifest.dev_dependencies {
            edges.insert(name.clone(), (spec.clone(), EdgeKind::Dev));
        }
    }
    for (name, spec) in &manifest.dependencies {
        edges.insert(name.clone(), (spec.clone(), EdgeKind::Prod));
    }
    for (name, spec) in &manifest.optional_dependencies {
        edges.insert(name.clone(), (spec.clone(), EdgeKind::Optional));
    }
    edges
}

/// Node's module resolution: the nearest `node_modules/<name>` walking up
/// from `from` to the project root.
fn resolve(by_location: &HashMap<String, usize>, from: &str, name: &str) -> Option<usize> {
    let mut location = from;
    loop {
        if let Some(&idx) = by_location.get(&child_location(location, name)) {
            return Some(idx);
        }
        if location.is_empty() {
            return None;
        }
        location = parent_location(location);
    }
}

fn child_location(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        format!("{NODE_MODULES}/{name}")
    } else {
        format!("{parent}/{NODE_MODULES}/{name}")
    }
}

/// `node_modules/a/node_modules/@s/b` → `node_modules/a`; top level → root.
fn parent_location(location: &str) -> &str {
    match location.rfind(&format!("/{NODE_MODULES}/")) {
        Some(idx) => &location[..idx],
        None => "",
    }
}
