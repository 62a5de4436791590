//! Python extractor using tree-sitter.
//!
//! Python is the one language analyzed from a full syntax tree, so nested
//! scopes, decorators, annotations and docstrings are read directly from
//! the tree. The parsed tree is kept in [`ParsedFile`] so the behavior and
//! quality passes can reuse it without re-parsing.

use tree_sitter::{Language as TsLanguage, Node, Parser, Point, Tree};

use crate::extract::scan::Scope;
use crate::extract::{Extraction, LanguageExtractor};
use crate::language::Language;
use crate::model::{
    merge_variable, Class, Function, Import, Parameter, SourceLocation, TypeKind, Variable,
    VariableScope,
};

/// A parsed tree plus the text it was parsed from.
pub struct ParsedFile {
    pub tree: Tree,
    pub source: String,
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Find the `function_definition` node a record was extracted from.
    pub fn function_at(&self, location: &SourceLocation) -> Option<Node<'_>> {
        let point = Point {
            row: location.start_line.saturating_sub(1),
            column: location.start_col.unwrap_or(1).saturating_sub(1),
        };
        let mut node = self.tree.root_node().descendant_for_point_range(point, point)?;
        loop {
            if node.kind() == "function_definition" && node.start_position().row == point.row {
                return Some(node);
            }
            node = node.parent()?;
        }
    }
}

pub struct PythonExtractor {
    language: TsLanguage,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Parse Python source into a tree.
    pub fn parse(&self, path: &str, content: &str) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path))?;

        Ok(ParsedFile {
            tree,
            source: content.to_string(),
            path: path.to_string(),
        })
    }

    /// Extract symbols from an already parsed file.
    ///
    /// A tree with syntax errors yields an empty extraction.
    pub fn extract_parsed(&self, parsed: &ParsedFile) -> Extraction {
        let mut out = Extraction::default();
        if parsed.has_errors() {
            return out;
        }

        let root = parsed.tree.root_node();
        self.collect_definitions(parsed, root, &Scope::root(), &mut out);
        self.collect_module_variables(parsed, root, &mut out.variables);
        collect_imports(parsed, root, &mut out.imports);
        out
    }

    /// Walk `node` looking for function and class definitions. Each
    /// definition handles its own body, so the walk stops there.
    fn collect_definitions(&self, parsed: &ParsedFile, node: Node, scope: &Scope, out: &mut Extraction) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let (def, decorators) = unwrap_decorated(parsed, child);
            match def.kind() {
                "function_definition" => {
                    let function = self.function(parsed, def, decorators, scope, out);
                    out.functions.push(function);
                }
                "class_definition" => {
                    let class = self.class(parsed, def, decorators, scope, out);
                    out.classes.push(class);
                }
                _ => self.collect_definitions(parsed, child, scope, out),
            }
        }
    }

    /// Build a function record. Functions nested in its body are pushed
    /// onto `out` with this function's name added to their scope.
    fn function(
        &self,
        parsed: &ParsedFile,
        node: Node,
        decorators: Vec<String>,
        scope: &Scope,
        out: &mut Extraction,
    ) -> Function {
        let name = node
            .child_by_field_name("name")
            .map(|n| parsed.node_text(n).to_string())
            .unwrap_or_default();

        let mut function = Function::new(name.clone(), SourceLocation::from_node(&parsed.path, node));
        function.scope = scope.qualifier();
        function.decorators = decorators;
        function.is_async = node.child(0).map(|c| c.kind() == "async").unwrap_or(false);
        function.params = node
            .child_by_field_name("parameters")
            .map(|p| parameters(parsed, p))
            .unwrap_or_default();
        function.returns = node
            .child_by_field_name("return_type")
            .map(|n| parsed.node_text(n).to_string());

        if let Some(body) = node.child_by_field_name("body") {
            function.docstring = docstring(parsed, body);
            self.collect_definitions(parsed, body, &scope.push(&name), out);
        }

        function
    }

    fn class(
        &self,
        parsed: &ParsedFile,
        node: Node,
        decorators: Vec<String>,
        scope: &Scope,
        out: &mut Extraction,
    ) -> Class {
        let name = node
            .child_by_field_name("name")
            .map(|n| parsed.node_text(n).to_string())
            .unwrap_or_default();

        let mut class = Class::new(
            name.clone(),
            TypeKind::Class,
            SourceLocation::from_node(&parsed.path, node),
        );
        class.scope = scope.qualifier();
        class.decorators = decorators;

        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut cursor = bases.walk();
            class.bases = bases
                .named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .map(|n| parsed.node_text(n).to_string())
                .collect();
        }

        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return class,
        };
        class.docstring = docstring(parsed, body);

        let inner = scope.push(&name);
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let (def, decorators) = unwrap_decorated(parsed, child);
            match def.kind() {
                "function_definition" => {
                    let method = self.function(parsed, def, decorators, &inner, out);
                    if let Some(method_body) = def.child_by_field_name("body") {
                        collect_self_attributes(parsed, method_body, &mut class.instance_variables);
                    }
                    class.methods.push(method);
                }
                "class_definition" => {
                    let nested = self.class(parsed, def, decorators, &inner, out);
                    out.classes.push(nested);
                }
                "expression_statement" => {
                    for var in assignment_variables(parsed, child, VariableScope::Class) {
                        merge_variable(&mut class.class_variables, var);
                    }
                }
                _ => {}
            }
        }

        class
    }

    /// Module-level assignments, including those under top-level `if`,
    /// `try` and `with` blocks.
    fn collect_module_variables(&self, parsed: &ParsedFile, node: Node, vars: &mut Vec<Variable>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "expression_statement" => {
                    for var in assignment_variables(parsed, child, VariableScope::Module) {
                        merge_variable(vars, var);
                    }
                }
                "function_definition" | "class_definition" | "decorated_definition" => {}
                _ => self.collect_module_variables(parsed, child, vars),
            }
        }
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        match self.parse(path, content) {
            Ok(parsed) => self.extract_parsed(&parsed),
            Err(_) => Extraction::default(),
        }
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        let parsed = match self.parse("", content) {
            Ok(p) if !p.has_errors() => p,
            _ => return Vec::new(),
        };
        let mut imports = Vec::new();
        collect_imports(&parsed, parsed.tree.root_node(), &mut imports);

        let mut deps: Vec<String> = Vec::new();
        for import in imports {
            let dep = if import.relative_depth > 0 {
                if import.module.is_empty() {
                    continue;
                }
                format!("{}{}", ".".repeat(import.relative_depth), import.module)
            } else if import.is_qualified_import {
                import.module
            } else {
                import.module.split('.').next().unwrap_or_default().to_string()
            };
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        deps
    }
}

/// Split a `decorated_definition` into its definition and decorator texts.
fn unwrap_decorated<'a>(parsed: &ParsedFile, node: Node<'a>) -> (Node<'a>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            let text = parsed.node_text(child).trim_start_matches('@').trim();
            decorators.push(text.to_string());
        }
    }
    match node.child_by_field_name("definition") {
        Some(def) => (def, decorators),
        None => (node, decorators),
    }
}

/// Positional parameters, stopping at `*`, `*args` or `**kwargs`.
fn parameters(parsed: &ParsedFile, node: Node) -> Vec<Parameter> {
    let mut params = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => params.push(Parameter::new(parsed.node_text(child), None)),
            "typed_parameter" => {
                let first = match child.named_child(0) {
                    Some(n) => n,
                    None => continue,
                };
                if first.kind() != "identifier" {
                    break;
                }
                let type_hint = child
                    .child_by_field_name("type")
                    .map(|t| parsed.node_text(t).to_string());
                params.push(Parameter::new(parsed.node_text(first), type_hint));
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = match child.child_by_field_name("name") {
                    Some(n) => parsed.node_text(n),
                    None => continue,
                };
                let type_hint = child
                    .child_by_field_name("type")
                    .map(|t| parsed.node_text(t).to_string());
                params.push(Parameter::new(name, type_hint));
            }
            "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
            _ => {}
        }
    }
    params
}

/// The leading string literal of a body block, with quotes removed.
fn docstring(parsed: &ParsedFile, body: Node) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    Some(clean_string_literal(parsed.node_text(string)))
}

/// Strip prefix letters and quotes, then dedent.
pub(crate) fn clean_string_literal(text: &str) -> String {
    let text = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find(|q| text.starts_with(*q) && text.ends_with(*q) && text.len() >= 2 * q.len())
        .map(|q| &text[q.len()..text.len() - q.len()])
        .unwrap_or(text);

    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Variables bound by an `expression_statement` holding an assignment.
fn assignment_variables(parsed: &ParsedFile, stmt: Node, scope: VariableScope) -> Vec<Variable> {
    let assignment = match stmt.named_child(0) {
        Some(n) if n.kind() == "assignment" => n,
        _ => return Vec::new(),
    };
    let left = match assignment.child_by_field_name("left") {
        Some(l) => l,
        None => return Vec::new(),
    };
    let type_hint = assignment
        .child_by_field_name("type")
        .map(|t| parsed.node_text(t).to_string());
    let value = assignment
        .child_by_field_name("right")
        .map(|r| parsed.node_text(r).to_string());

    let targets: Vec<Node> = match left.kind() {
        "identifier" => vec![left],
        "pattern_list" | "tuple_pattern" => {
            let mut cursor = left.walk();
            let names: Vec<Node> = left
                .named_children(&mut cursor)
                .filter(|n| n.kind() == "identifier")
                .collect();
            names
        }
        _ => Vec::new(),
    };

    targets
        .into_iter()
        .map(|target| {
            let mut var = Variable::new(
                parsed.node_text(target),
                scope,
                SourceLocation::from_node(&parsed.path, stmt),
            );
            var.type_hint = type_hint.clone();
            var.value = value.clone();
            var
        })
        .collect()
}

/// `self.x = ...` assignments inside a method body become instance variables.
fn collect_self_attributes(parsed: &ParsedFile, node: Node, vars: &mut Vec<Variable>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" | "decorated_definition" | "lambda" => {}
            "assignment" | "augmented_assignment" => {
                if let Some(left) = child.child_by_field_name("left") {
                    if let Some(name) = self_attribute(parsed, left) {
                        let mut var = Variable::new(
                            name,
                            VariableScope::Class,
                            SourceLocation::from_node(&parsed.path, child),
                        );
                        var.type_hint = child
                            .child_by_field_name("type")
                            .map(|t| parsed.node_text(t).to_string());
                        var.value = child
                            .child_by_field_name("right")
                            .map(|r| parsed.node_text(r).to_string());
                        merge_variable(vars, var);
                    }
                }
                collect_self_attributes(parsed, child, vars);
            }
            _ => collect_self_attributes(parsed, child, vars),
        }
    }
}

fn self_attribute<'a>(parsed: &'a ParsedFile, node: Node) -> Option<&'a str> {
    if node.kind() != "attribute" {
        return None;
    }
    let object = node.child_by_field_name("object")?;
    if parsed.node_text(object) != "self" {
        return None;
    }
    node.child_by_field_name("attribute").map(|a| parsed.node_text(a))
}

/// Every import statement in the tree, one record per imported name.
fn collect_imports(parsed: &ParsedFile, node: Node, imports: &mut Vec<Import>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                let location = SourceLocation::from_node(&parsed.path, child);
                let mut names = child.walk();
                for name in child.children_by_field_name("name", &mut names) {
                    let (module, alias) = split_alias(parsed, name);
                    let mut import = Import::new(module, location.clone());
                    import.alias = alias;
                    imports.push(import);
                }
            }
            "import_from_statement" => {
                let location = SourceLocation::from_node(&parsed.path, child);
                let (module, depth) = match child.child_by_field_name("module_name") {
                    Some(m) if m.kind() == "relative_import" => relative_module(parsed, m),
                    Some(m) => (parsed.node_text(m).to_string(), 0),
                    None => (String::new(), 0),
                };

                let mut imported: Vec<(String, Option<String>)> = Vec::new();
                let mut names = child.walk();
                for name in child.children_by_field_name("name", &mut names) {
                    imported.push(split_alias(parsed, name));
                }
                let mut inner = child.walk();
                if child
                    .named_children(&mut inner)
                    .any(|n| n.kind() == "wildcard_import")
                {
                    imported.push(("*".to_string(), None));
                }

                for (name, alias) in imported {
                    let mut import = Import::new(module.clone(), location.clone());
                    import.names = vec![name];
                    import.alias = alias;
                    import.is_qualified_import = true;
                    import.relative_depth = depth;
                    imports.push(import);
                }
            }
            _ => collect_imports(parsed, child, imports),
        }
    }
}

fn split_alias(parsed: &ParsedFile, node: Node) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| parsed.node_text(n).to_string())
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|n| parsed.node_text(n).to_string());
        (name, alias)
    } else {
        (parsed.node_text(node).to_string(), None)
    }
}

/// Module text and dot count of a `relative_import` node.
fn relative_module(parsed: &ParsedFile, node: Node) -> (String, usize) {
    let mut depth = 0;
    let mut module = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_prefix" => depth = parsed.node_text(child).matches('.').count(),
            "dotted_name" => module = parsed.node_text(child).to_string(),
            _ => {}
        }
    }
    (module, depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Extraction {
        PythonExtractor::new().extract("pkg/mod.py", source)
    }

    #[test]
    fn test_extract_functions_and_params() {
        let source = r#"
@cache
async def fetch(url: str, retries=3, *args, timeout: float = 1.0) -> bytes:
    """Fetch a URL.

    Retries on failure.
    """
    return b""

def simple():
    pass
"#;
        let out = extract(source);
        let fetch = out.functions.iter().find(|f| f.name == "fetch").unwrap();
        assert!(fetch.is_async);
        assert_eq!(fetch.decorators, vec!["cache"]);
        assert_eq!(fetch.params.len(), 2, "splat and keyword-only params are excluded");
        assert_eq!(fetch.params[0].type_hint.as_deref(), Some("str"));
        assert_eq!(fetch.returns.as_deref(), Some("bytes"));
        assert_eq!(fetch.docstring.as_deref(), Some("Fetch a URL.\n\nRetries on failure."));
        assert_eq!(fetch.location.start_line, 3);
        assert_eq!(fetch.location.end_line, 8);

        assert!(out.functions.iter().any(|f| f.name == "simple"));
    }

    #[test]
    fn test_nested_scopes() {
        let source = r#"
def outer():
    def inner():
        pass
    return inner

class Box:
    class Lid:
        pass

    def open(self):
        def helper():
            pass
"#;
        let out = extract(source);
        let inner = out.functions.iter().find(|f| f.name == "inner").unwrap();
        assert_eq!(inner.qualified_name(), "outer::inner");
        let helper = out.functions.iter().find(|f| f.name == "helper").unwrap();
        assert_eq!(helper.qualified_name(), "Box::open::helper");

        let lid = out.classes.iter().find(|c| c.name == "Lid").unwrap();
        assert_eq!(lid.qualified_name(), "Box::Lid");
        let boxed = out.classes.iter().find(|c| c.name == "Box").unwrap();
        assert_eq!(boxed.methods.len(), 1);
        assert_eq!(boxed.methods[0].qualified_name(), "Box::open");
    }

    #[test]
    fn test_class_members() {
        let source = r#"
class Service(Base, metaclass=ABCMeta):
    """Does things."""
    _instance = None
    retries: int = 3

    def __init__(self, name):
        self.name = name
        if name:
            self.ready = True
        self.name = name.strip()
"#;
        let out = extract(source);
        let class = &out.classes[0];
        assert_eq!(class.bases, vec!["Base", "metaclass=ABCMeta"]);
        assert_eq!(class.docstring.as_deref(), Some("Does things."));
        assert_eq!(class.class_variables.len(), 2);
        assert_eq!(class.class_variables[1].type_hint.as_deref(), Some("int"));

        assert_eq!(class.instance_variables.len(), 2);
        let name = class.instance_variables.iter().find(|v| v.name == "name").unwrap();
        assert_eq!(name.locations.len(), 2);
    }

    #[test]
    fn test_imports_and_dependencies() {
        let source = r#"
import os.path as osp
from . import sibling
from ..core.models import User, Group as G
from typing import *

def lazy():
    import json
"#;
        let out = extract(source);
        let osp = out.imports.iter().find(|i| i.module == "os.path").unwrap();
        assert_eq!(osp.alias.as_deref(), Some("osp"));
        assert!(!osp.is_qualified_import);

        let sibling = out
            .imports
            .iter()
            .find(|i| i.names == vec!["sibling".to_string()])
            .unwrap();
        assert_eq!(sibling.module, "");
        assert_eq!(sibling.relative_depth, 1);

        let group = out
            .imports
            .iter()
            .find(|i| i.names == vec!["Group".to_string()])
            .unwrap();
        assert_eq!(group.module, "core.models");
        assert_eq!(group.relative_depth, 2);
        assert_eq!(group.alias.as_deref(), Some("G"));

        assert!(out.imports.iter().any(|i| i.names == vec!["*".to_string()]));
        assert!(out.imports.iter().any(|i| i.module == "json"));

        let deps = PythonExtractor::new().dependencies(source);
        assert_eq!(deps, vec!["os", "..core.models", "typing", "json"]);
    }

    #[test]
    fn test_module_variables() {
        let source = "VERSION = \"1.0\"\nlimit: int = 10\na, b = 1, 2\nif DEBUG:\n    LEVEL = 5\n";
        let out = extract(source);
        let names: Vec<_> = out.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["VERSION", "limit", "a", "b", "LEVEL"]);
        assert_eq!(out.variables[0].value.as_deref(), Some("\"1.0\""));
    }

    #[test]
    fn test_syntax_error_yields_empty_extraction() {
        let out = extract("def broken(:\n    pass\n");
        assert!(out.functions.is_empty());
        assert!(out.imports.is_empty());
    }

    #[test]
    fn test_function_at_finds_node() {
        let extractor = PythonExtractor::new();
        let parsed = extractor.parse("a.py", "x = 1\n\nasync def go():\n    return 1\n").unwrap();
        let out = extractor.extract_parsed(&parsed);
        let node = parsed.function_at(&out.functions[0].location).unwrap();
        assert_eq!(node.kind(), "function_definition");
        assert_eq!(node.start_position().row, 2);
    }
}
