//! Name-based call graph.
//!
//! Callees are recorded by bare name: a direct call `f()` contributes `f`,
//! a method call `obj.f()` contributes `f`. Functions are matched against
//! these names without qualification, so same-named functions in different
//! files share their callers.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::Node;

use crate::extract::ParsedFile;
use crate::model::FileRecord;

lazy_static! {
    static ref CALL: Regex = Regex::new(r"([A-Za-z_$][\w$]*)\s*(?:<[\w\s,<>:*&]*>)?\s*\(").unwrap();
}

/// Words followed by `(` that are not calls.
const NOT_A_CALL: &[&str] = &[
    "if", "for", "foreach", "while", "switch", "catch", "return", "sizeof", "typeof",
    "function", "using", "lock", "fixed", "defined", "alignof", "decltype", "nameof",
    "when", "await", "throw", "new", "delete", "else", "do", "in", "of",
];

/// Call sites of one file as `(line, callee)` pairs in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSites {
    sites: Vec<(usize, String)>,
}

impl CallSites {
    /// Distinct callee names anywhere in the file.
    pub fn names(&self) -> BTreeSet<&str> {
        self.sites.iter().map(|(_, n)| n.as_str()).collect()
    }

    /// Distinct callee names on lines `start..=end`.
    pub fn names_between(&self, start: usize, end: usize) -> BTreeSet<&str> {
        self.sites
            .iter()
            .filter(|(line, _)| (start..=end).contains(line))
            .map(|(_, n)| n.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Drop the matches that are the record's own function headers.
    pub fn remove_declarations(&mut self, record: &FileRecord) {
        let headers: BTreeSet<(usize, &str)> = record
            .all_functions()
            .map(|f| (f.location.start_line, f.name.as_str()))
            .collect();
        self.sites
            .retain(|(line, name)| !headers.contains(&(*line, name.as_str())));
    }
}

/// Collect call sites from a Python syntax tree.
pub fn python_call_sites(parsed: &ParsedFile) -> CallSites {
    let mut sites = Vec::new();
    collect_calls(parsed, parsed.tree.root_node(), &mut sites);
    sites.sort();
    CallSites { sites }
}

fn collect_calls(parsed: &ParsedFile, node: Node, out: &mut Vec<(usize, String)>) {
    if node.kind() == "call" {
        if let Some(function) = node.child_by_field_name("function") {
            let callee = match function.kind() {
                "identifier" => Some(function),
                "attribute" => function.child_by_field_name("attribute"),
                _ => None,
            };
            if let Some(callee) = callee {
                out.push((
                    callee.start_position().row + 1,
                    parsed.node_text(callee).to_string(),
                ));
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(parsed, child, out);
    }
}

/// Collect call sites from a comment- and literal-blanked code view.
pub fn scanned_call_sites(code: &[String]) -> CallSites {
    let mut sites = Vec::new();
    for (i, line) in code.iter().enumerate() {
        for caps in CALL.captures_iter(line) {
            let name = &caps[1];
            if !NOT_A_CALL.contains(&name) {
                sites.push((i + 1, name.to_string()));
            }
        }
    }
    CallSites { sites }
}

/// Collect every file's call sites: from the syntax tree when one is
/// available, otherwise from the code view.
pub fn collect_call_names(parsed: Option<&ParsedFile>, code: &[String]) -> CallSites {
    match parsed {
        Some(parsed) => python_call_sites(parsed),
        None => scanned_call_sites(code),
    }
}

/// Project-wide caller index.
#[derive(Debug, Default)]
pub struct CallGraph {
    /// Bare callee name to the files that call it.
    callers: BTreeMap<String, BTreeSet<String>>,
    /// Names of every function defined in the project.
    defined: BTreeSet<String>,
}

impl CallGraph {
    /// Build the index once every file's call sites are known.
    pub fn build(files: &BTreeMap<String, FileRecord>, sites: &BTreeMap<String, CallSites>) -> Self {
        let mut graph = CallGraph::default();
        for record in files.values() {
            graph
                .defined
                .extend(record.all_functions().map(|f| f.name.clone()));
        }
        for (path, calls) in sites {
            for name in calls.names() {
                graph
                    .callers
                    .entry(name.to_string())
                    .or_default()
                    .insert(path.clone());
            }
        }
        graph
    }

    /// Files that call `name`, sorted.
    pub fn callers_of(&self, name: &str) -> Vec<String> {
        self.callers
            .get(name)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name)
    }

    /// Fill `calls` and `called_by` on every function of `record`.
    pub fn apply(&self, record: &mut FileRecord, sites: &CallSites) {
        for function in record.all_functions_mut() {
            function.calls = sites
                .names_between(function.location.start_line, function.location.end_line)
                .into_iter()
                .filter(|name| self.is_defined(name))
                .map(String::from)
                .collect();
            function.called_by = self.callers_of(&function.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::scan::code_view;
    use crate::extract::PythonExtractor;
    use crate::model::{Function, SourceLocation};

    fn record(path: &str, functions: &[(&str, usize, usize)]) -> FileRecord {
        let mut record = FileRecord::new(path, "python");
        for (name, start, end) in functions {
            record
                .functions
                .push(Function::new(*name, SourceLocation::new(path, *start, *end)));
        }
        record
    }

    #[test]
    fn test_python_call_sites() {
        let source = "def main():\n    cfg = load()\n    app.run(cfg)\n    print(len(cfg))\n";
        let parsed = PythonExtractor::new().parse("main.py", source).unwrap();
        let sites = python_call_sites(&parsed);
        let names: Vec<_> = sites.names().into_iter().collect();
        assert_eq!(names, vec!["len", "load", "print", "run"]);
        let on_line_3: Vec<_> = sites.names_between(3, 3).into_iter().collect();
        assert_eq!(on_line_3, vec!["run"]);
    }

    #[test]
    fn test_scanned_call_sites_skip_keywords() {
        let lines: Vec<String> = [
            "function start() {",
            "  if (ready()) { return init(config); }",
            "  // stop()",
            "  const s = \"halt()\";",
            "  this.render<T>(s);",
            "}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let sites = scanned_call_sites(&code_view(&lines, true));
        let names: Vec<_> = sites.names().into_iter().collect();
        assert_eq!(names, vec!["init", "ready", "render", "start"]);
    }

    #[test]
    fn test_remove_declarations() {
        let mut sites = CallSites {
            sites: vec![(1, "start".to_string()), (2, "run".to_string()), (4, "start".to_string())],
        };
        sites.remove_declarations(&record("a.js", &[("start", 1, 3)]));
        let names: Vec<_> = sites.sites.iter().map(|(l, n)| (*l, n.as_str())).collect();
        assert_eq!(names, vec![(2, "run"), (4, "start")]);
    }

    #[test]
    fn test_bare_name_matching_across_files() {
        let mut files = BTreeMap::new();
        files.insert("a.py".to_string(), record("a.py", &[("helper", 1, 2), ("main", 4, 6)]));
        files.insert("b.py".to_string(), record("b.py", &[("helper", 1, 3)]));

        let mut sites = BTreeMap::new();
        sites.insert(
            "a.py".to_string(),
            CallSites {
                sites: vec![(5, "helper".to_string()), (6, "print".to_string())],
            },
        );
        sites.insert("b.py".to_string(), CallSites::default());

        let graph = CallGraph::build(&files, &sites);
        for (path, record) in files.iter_mut() {
            graph.apply(record, &sites[path]);
        }

        let main = &files["a.py"].functions[1];
        assert_eq!(main.calls, vec!["helper"]);
        assert!(main.called_by.is_empty());
        // Both helpers share the caller: matching is by bare name.
        assert_eq!(files["a.py"].functions[0].called_by, vec!["a.py"]);
        assert_eq!(files["b.py"].functions[0].called_by, vec!["a.py"]);
    }
}
