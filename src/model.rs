//! Language-agnostic records produced by analysis.
//!
//! Every type here is plain nested data: strings, numbers, vectors and
//! ordered maps. A `ProjectAnalysis` can therefore be handed to any serde
//! serializer without further cooperation from the engine, and two runs
//! over the same input serialize to identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resolve::DependencyGraph;

/// Location of a symbol in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Project-relative path of the file.
    pub file: String,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// End line (1-indexed, never before `start_line`).
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_col: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_col: Option<usize>,
}

impl SourceLocation {
    /// Create a line range. An end before the start is clamped to the start.
    pub fn new(file: &str, start_line: usize, end_line: usize) -> Self {
        let start_line = start_line.max(1);
        Self {
            file: file.to_string(),
            start_line,
            end_line: end_line.max(start_line),
            start_col: None,
            end_col: None,
        }
    }

    /// A location covering a single line.
    pub fn line(file: &str, line: usize) -> Self {
        Self::new(file, line, line)
    }

    /// Create a location from a tree-sitter node.
    pub fn from_node(file: &str, node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        let mut loc = Self::new(file, start.row + 1, end.row + 1); // tree-sitter is 0-indexed
        loc.start_col = Some(start.column + 1);
        loc.end_col = Some(end.column + 1);
        loc
    }

    /// Number of lines covered, inclusive.
    pub fn line_span(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Move the location down by `offset` lines.
    pub fn shift(&mut self, offset: usize) {
        self.start_line += offset;
        self.end_line += offset;
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.start_line)
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_hint: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_hint,
        }
    }

    /// Whether this is an implicit receiver (`self`, `cls`, `this`).
    pub fn is_receiver(&self) -> bool {
        matches!(self.name.as_str(), "self" | "cls" | "this")
    }
}

/// A function, method, constructor or synthetic handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Enclosing namespace/class path, `::`-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub params: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Access and storage modifiers (`public`, `static`, `virtual`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    /// `None` where no syntax tree is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<FunctionBehavior>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variable_flow: BTreeMap<String, VariableFlow>,
    /// Project-defined callee names referenced from the body.
    #[serde(default)]
    pub calls: Vec<String>,
    /// Files that reference this function's name.
    #[serde(default)]
    pub called_by: Vec<String>,
}

impl Function {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            scope: None,
            params: Vec::new(),
            returns: None,
            docstring: None,
            decorators: Vec::new(),
            modifiers: Vec::new(),
            is_async: false,
            location,
            complexity: None,
            behavior: None,
            variable_flow: BTreeMap::new(),
            calls: Vec::new(),
            called_by: Vec::new(),
        }
    }

    /// Get the fully qualified name (`Outer::Inner::name`).
    pub fn qualified_name(&self) -> String {
        match self.scope {
            Some(ref scope) => format!("{}::{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Parameters excluding an implicit receiver.
    pub fn explicit_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.is_receiver())
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub(crate) fn shift(&mut self, offset: usize) {
        self.location.shift(offset);
    }
}

/// Kind of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    TypeAlias,
    Union,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Record => "record",
            TypeKind::TypeAlias => "type_alias",
            TypeKind::Union => "union",
        }
    }

    /// Parse a declaration keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(TypeKind::Class),
            "struct" => Some(TypeKind::Struct),
            "interface" => Some(TypeKind::Interface),
            "enum" => Some(TypeKind::Enum),
            "record" => Some(TypeKind::Record),
            "type" => Some(TypeKind::TypeAlias),
            "union" => Some(TypeKind::Union),
            _ => None,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A class, struct, interface, enum or record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub kind: TypeKind,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub methods: Vec<Function>,
    #[serde(default)]
    pub class_variables: Vec<Variable>,
    #[serde(default)]
    pub instance_variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    pub location: SourceLocation,
}

impl Class {
    pub fn new(name: impl Into<String>, kind: TypeKind, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            scope: None,
            kind,
            bases: Vec::new(),
            methods: Vec::new(),
            class_variables: Vec::new(),
            instance_variables: Vec::new(),
            docstring: None,
            decorators: Vec::new(),
            modifiers: Vec::new(),
            location,
        }
    }

    pub fn qualified_name(&self) -> String {
        match self.scope {
            Some(ref scope) => format!("{}::{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub(crate) fn shift(&mut self, offset: usize) {
        self.location.shift(offset);
        for m in &mut self.methods {
            m.shift(offset);
        }
        for v in self
            .class_variables
            .iter_mut()
            .chain(self.instance_variables.iter_mut())
        {
            v.shift(offset);
        }
    }
}

/// Where a variable is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Module,
    Class,
    Local,
    Parameter,
    /// Reactive component state.
    Component,
    /// Bound by template syntax.
    Template,
}

/// A declared variable. Repeated bindings of one name share a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub scope: VariableScope,
    /// Every place the name is bound; never empty.
    pub locations: Vec<SourceLocation>,
}

impl Variable {
    pub fn new(name: impl Into<String>, scope: VariableScope, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            type_hint: None,
            value: None,
            scope,
            locations: vec![location],
        }
    }

    /// First binding site.
    pub fn location(&self) -> &SourceLocation {
        &self.locations[0]
    }

    pub(crate) fn shift(&mut self, offset: usize) {
        for loc in &mut self.locations {
            loc.shift(offset);
        }
    }
}

/// Add `var` to `vars`, or record another location on an existing binding
/// of the same name and scope.
pub(crate) fn merge_variable(vars: &mut Vec<Variable>, var: Variable) {
    match vars
        .iter_mut()
        .find(|v| v.name == var.name && v.scope == var.scope)
    {
        Some(existing) => {
            existing.locations.extend(var.locations);
            if existing.type_hint.is_none() {
                existing.type_hint = var.type_hint;
            }
        }
        None => vars.push(var),
    }
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Dotted module path or module specifier, as written (without leading dots).
    pub module: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// True for partial imports (`from x import y`, `import { y } from "x"`).
    pub is_qualified_import: bool,
    /// 0 for absolute imports, otherwise the number of leading dots.
    pub relative_depth: usize,
    pub location: SourceLocation,
}

impl Import {
    pub fn new(module: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
            alias: None,
            is_qualified_import: false,
            relative_depth: 0,
            location,
        }
    }
}

/// Kind of a control-flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    If,
    While,
    For,
    Try,
    Return,
}

/// A branching or exiting construct inside a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlowNode {
    pub line: usize,
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub true_branch: BTreeSet<usize>,
    #[serde(default)]
    pub false_branch: BTreeSet<usize>,
    /// Index of the enclosing node in the same list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

/// Behavioral classification of one function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionBehavior {
    pub pure: bool,
    pub side_effects: Vec<String>,
    pub raises: BTreeSet<String>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_recursive: bool,
    pub control_flow: Vec<ControlFlowNode>,
    /// Each path is the line sequence from entry to one `return`.
    pub return_paths: Vec<Vec<usize>>,
    /// Callees of `return f(...)`.
    pub exit_points: Vec<String>,
}

/// How a name is bound inside a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowScope {
    Local,
    Global,
    Nonlocal,
    Parameter,
}

/// Assignments and reads of one name inside a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableFlow {
    pub name: String,
    pub assignments: Vec<usize>,
    pub reads: Vec<usize>,
    pub scope: FlowScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

impl VariableFlow {
    pub fn new(name: impl Into<String>, scope: FlowScope) -> Self {
        Self {
            name: name.into(),
            assignments: Vec::new(),
            reads: Vec::new(),
            scope,
            type_hint: None,
        }
    }
}

/// Design patterns recognized by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DesignPattern {
    Singleton,
    Factory,
    Observer,
    Strategy,
    Decorator,
}

impl DesignPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignPattern::Singleton => "Singleton",
            DesignPattern::Factory => "Factory",
            DesignPattern::Observer => "Observer",
            DesignPattern::Strategy => "Strategy",
            DesignPattern::Decorator => "Decorator",
        }
    }
}

impl fmt::Display for DesignPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Threshold-triggered structural warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmellKind {
    #[serde(rename = "Long Method")]
    LongMethod,
    #[serde(rename = "Large Class")]
    LargeClass,
    #[serde(rename = "Too Many Parameters")]
    TooManyParameters,
    #[serde(rename = "Deep Nesting")]
    DeepNesting,
}

impl SmellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmellKind::LongMethod => "Long Method",
            SmellKind::LargeClass => "Large Class",
            SmellKind::TooManyParameters => "Too Many Parameters",
            SmellKind::DeepNesting => "Deep Nesting",
        }
    }
}

impl fmt::Display for SmellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One code-smell finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSmell {
    pub kind: SmellKind,
    pub line: usize,
    pub message: String,
}

/// Everything known about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Project-relative, `/`-separated. Unique key.
    pub path: String,
    pub language: String,
    pub size_bytes: u64,
    /// Modification time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    pub line_count: usize,
    pub functions: Vec<Function>,
    pub classes: Vec<Class>,
    pub variables: Vec<Variable>,
    pub imports: Vec<Import>,
    /// Dependency strings as the extractor reported them.
    pub raw_dependencies: Vec<String>,
    /// Resolved project paths this file imports.
    pub dependencies: Vec<String>,
    /// Project paths that import this file.
    pub dependents: Vec<String>,
    pub patterns: Vec<DesignPattern>,
    pub smells: Vec<CodeSmell>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            size_bytes: 0,
            modified: None,
            line_count: 0,
            functions: Vec::new(),
            classes: Vec::new(),
            variables: Vec::new(),
            imports: Vec::new(),
            raw_dependencies: Vec::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            patterns: Vec::new(),
            smells: Vec::new(),
        }
    }

    /// Free functions followed by class methods.
    pub fn all_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    pub fn all_functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions
            .iter_mut()
            .chain(self.classes.iter_mut().flat_map(|c| c.methods.iter_mut()))
    }

    /// Every source location carried by the record.
    pub fn locations(&self) -> Vec<&SourceLocation> {
        let mut out = Vec::new();
        for f in self.all_functions() {
            out.push(&f.location);
        }
        for c in &self.classes {
            out.push(&c.location);
            for v in c.class_variables.iter().chain(c.instance_variables.iter()) {
                out.extend(v.locations.iter());
            }
        }
        for v in &self.variables {
            out.extend(v.locations.iter());
        }
        for i in &self.imports {
            out.push(&i.location);
        }
        out
    }
}

/// A file excluded from the result, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// The aggregate result of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAnalysis {
    pub root: String,
    pub name: String,
    pub files: BTreeMap<String, FileRecord>,
    pub dependency_graph: DependencyGraph,
    pub languages: BTreeMap<String, usize>,
    pub total_files: usize,
    pub total_size: u64,
    pub total_lines: usize,
    pub entry_points: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl ProjectAnalysis {
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Find a function or method by bare name across all files.
    pub fn find_function(&self, name: &str) -> Vec<&Function> {
        self.files
            .values()
            .flat_map(|f| f.all_functions())
            .filter(|f| f.name == name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_clamps_end_before_start() {
        let loc = SourceLocation::new("a.py", 10, 3);
        assert_eq!(loc.start_line, 10);
        assert_eq!(loc.end_line, 10);
        assert_eq!(loc.line_span(), 1);
    }

    #[test]
    fn test_qualified_name() {
        let mut f = Function::new("run", SourceLocation::line("a.cpp", 1));
        assert_eq!(f.qualified_name(), "run");
        f.scope = Some("app::Engine".to_string());
        assert_eq!(f.qualified_name(), "app::Engine::run");
    }

    #[test]
    fn test_merge_variable_keeps_all_locations() {
        let mut vars = Vec::new();
        merge_variable(
            &mut vars,
            Variable::new("x", VariableScope::Module, SourceLocation::line("a.py", 1)),
        );
        let mut second = Variable::new("x", VariableScope::Module, SourceLocation::line("a.py", 4));
        second.type_hint = Some("int".to_string());
        merge_variable(&mut vars, second);

        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].locations.len(), 2);
        assert_eq!(vars[0].type_hint.as_deref(), Some("int"));
    }

    #[test]
    fn test_smell_kind_serializes_as_display_name() {
        let smell = CodeSmell {
            kind: SmellKind::TooManyParameters,
            line: 3,
            message: "Method has 7 parameters (max 5)".to_string(),
        };
        let json = serde_json::to_string(&smell).unwrap();
        assert!(json.contains("\"Too Many Parameters\""));
    }

    #[test]
    fn test_explicit_params_skip_receiver() {
        let mut f = Function::new("m", SourceLocation::line("a.py", 1));
        f.params = vec![Parameter::new("self", None), Parameter::new("x", None)];
        assert_eq!(f.explicit_params().count(), 1);
    }
}
