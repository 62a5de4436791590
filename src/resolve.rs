//! Import resolution and the project dependency graph.
//!
//! Each import is turned into candidate project paths by language-specific
//! rules; the first candidate that names an analyzed file becomes an edge.
//! Imports that resolve nowhere in the file set are external and dropped.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::language::Language;
use crate::model::{FileRecord, Import};

/// Source suffixes tried for script-module specifiers.
const SCRIPT_SUFFIXES: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".svelte"];

/// Directed graph of file paths; an edge `a -> b` means `a` imports `b`.
/// Cycles are allowed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if not present, returning its index.
    pub fn add_node(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.indices.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.indices.insert(path.to_string(), idx);
        idx
    }

    /// Add an edge. Returns `false` for self edges and duplicates.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let u = self.add_node(from);
        let v = self.add_node(to);
        if self.graph.find_edge(u, v).is_some() {
            return false;
        }
        self.graph.add_edge(u, v, ());
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.indices.contains_key(path)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Files `path` imports, sorted.
    pub fn dependencies_of(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Files importing `path`, sorted.
    pub fn dependents_of(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let idx = match self.indices.get(path) {
            Some(&idx) => idx,
            None => return Vec::new(),
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Strongly connected components with more than one file, each sorted,
    /// ordered by their first path.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut paths: Vec<String> =
                    component.iter().map(|&n| self.graph[n].clone()).collect();
                paths.sort();
                paths
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Forward adjacency for every node.
    pub fn forward(&self) -> BTreeMap<String, Vec<String>> {
        self.indices
            .keys()
            .map(|path| (path.clone(), self.dependencies_of(path)))
            .collect()
    }

    /// Backward adjacency for every node.
    pub fn backward(&self) -> BTreeMap<String, Vec<String>> {
        self.indices
            .keys()
            .map(|path| (path.clone(), self.dependents_of(path)))
            .collect()
    }
}

impl Serialize for DependencyGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DependencyGraph", 3)?;
        state.serialize_field("forward", &self.forward())?;
        state.serialize_field("backward", &self.backward())?;
        state.serialize_field("cycles", &self.cycles())?;
        state.end()
    }
}

/// Resolves import records against the set of analyzed paths.
pub struct DependencyResolver {
    known: BTreeSet<String>,
}

impl DependencyResolver {
    pub fn new(files: &BTreeMap<String, FileRecord>) -> Self {
        Self {
            known: files.keys().cloned().collect(),
        }
    }

    /// Build the graph and fill each file's `dependencies`/`dependents`.
    pub fn resolve(&self, files: &mut BTreeMap<String, FileRecord>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for path in files.keys() {
            graph.add_node(path);
        }

        let mut edges: Vec<(String, String)> = Vec::new();
        for (path, file) in files.iter() {
            let language = Language::from_path(path);
            for import in &file.imports {
                if let Some(target) = self.resolve_import(path, language, import, file) {
                    if graph.add_edge(path, &target) {
                        edges.push((path.clone(), target));
                    }
                }
            }
        }

        for (from, to) in edges {
            if let Some(file) = files.get_mut(&from) {
                file.dependencies.push(to.clone());
            }
            if let Some(file) = files.get_mut(&to) {
                file.dependents.push(from);
            }
        }
        for file in files.values_mut() {
            file.dependencies.sort();
            file.dependents.sort();
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "resolved dependency graph"
        );
        graph
    }

    /// First candidate path that is part of the analyzed set.
    pub fn resolve_import(
        &self,
        importer: &str,
        language: Language,
        import: &Import,
        file: &FileRecord,
    ) -> Option<String> {
        candidates(importer, language, import, file)
            .into_iter()
            .find(|c| self.known.contains(c))
    }
}

/// Candidate project paths for one import, in priority order.
pub fn candidates(importer: &str, language: Language, import: &Import, file: &FileRecord) -> Vec<String> {
    let dir = parent_dir(importer);
    let raw: Vec<String> = match language {
        Language::Python => python_candidates(dir, import),
        Language::CSharp => vec![format!("{}.cs", import.module.replace('.', "/"))],
        Language::JavaScript | Language::TypeScript | Language::Svelte => {
            script_candidates(dir, &import.module)
        }
        Language::Cpp => {
            // Only quoted includes name project files.
            if file.raw_dependencies.iter().any(|d| d == &import.module) {
                vec![join(dir, &import.module), import.module.clone()]
            } else {
                Vec::new()
            }
        }
        Language::Unknown => Vec::new(),
    };

    let mut seen = BTreeSet::new();
    raw.into_iter()
        .filter_map(|c| normalize(&c))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

fn python_candidates(dir: &str, import: &Import) -> Vec<String> {
    let module_path = import.module.replace('.', "/");
    let module_files = |base: &str| -> Vec<String> {
        vec![
            join(base, &format!("{}.py", module_path)),
            join(base, &format!("{}/__init__.py", module_path)),
        ]
    };

    if import.relative_depth == 0 {
        if module_path.is_empty() {
            return Vec::new();
        }
        let mut out = module_files("");
        if !dir.is_empty() {
            out.extend(module_files(dir));
        }
        return out;
    }

    // One dot is the importer's own package; each further dot walks up.
    let mut base = dir.to_string();
    for _ in 1..import.relative_depth {
        if base.is_empty() {
            return Vec::new();
        }
        base = parent_dir(&base).to_string();
    }

    if module_path.is_empty() {
        // Names not found as modules may be defined by the package itself.
        let mut out: Vec<String> = import
            .names
            .iter()
            .filter(|n| n.as_str() != "*")
            .flat_map(|name| {
                vec![
                    join(&base, &format!("{}.py", name)),
                    join(&base, &format!("{}/__init__.py", name)),
                ]
            })
            .collect();
        out.push(join(&base, "__init__.py"));
        out
    } else {
        module_files(&base)
    }
}

fn script_candidates(dir: &str, specifier: &str) -> Vec<String> {
    let base = if specifier.starts_with("./") || specifier.starts_with("../") {
        join(dir, specifier)
    } else if let Some(rest) = specifier.strip_prefix("$lib/") {
        format!("src/lib/{}", rest)
    } else if let Some(rest) = specifier.strip_prefix('/') {
        rest.to_string()
    } else {
        return Vec::new();
    };

    let mut out = vec![base.clone()];
    out.extend(SCRIPT_SUFFIXES.iter().map(|s| format!("{}{}", base, s)));
    out.extend(SCRIPT_SUFFIXES.iter().map(|s| format!("{}/index{}", base, s)));
    if let Some(stem) = base.strip_suffix(".js") {
        out.push(format!("{}.ts", stem));
        out.push(format!("{}.tsx", stem));
    }
    out
}

/// Directory part of a `/`-separated path, `""` at the root.
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", dir, rel)
    }
}

/// Collapse `.` and `..` segments. `None` when the path escapes the root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
