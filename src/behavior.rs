//! Per-function behavior analysis over the Python syntax tree.
//!
//! A single depth-first walk of a function body records control flow,
//! return paths, variable bindings and reads, exception types, and the
//! facts that make a function impure: reads of unbound (global) names,
//! `global`/`nonlocal` declarations, and calls to configured I/O-like
//! operations. Nested function and class bodies are not entered; they are
//! analyzed on their own.

use std::collections::{BTreeMap, BTreeSet};

use phf::phf_set;
use tree_sitter::Node;

use crate::extract::scan::word_end;
use crate::extract::ParsedFile;
use crate::model::{ControlFlowNode, FlowKind, FlowScope, FunctionBehavior, VariableFlow};

/// Names that are never global reads.
static BUILTINS: phf::Set<&'static str> = phf_set! {
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes",
    "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset",
    "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input", "int",
    "isinstance", "issubclass", "iter", "len", "list", "locals", "map", "max",
    "memoryview", "min", "next", "object", "oct", "open", "ord", "pow", "print",
    "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
    "__import__", "__name__", "__file__", "NotImplemented", "Ellipsis",
    "Exception", "BaseException", "ValueError", "TypeError", "KeyError", "IndexError",
    "RuntimeError", "AttributeError", "NotImplementedError", "StopIteration",
    "OSError", "IOError", "FileNotFoundError", "ZeroDivisionError", "AssertionError",
};

/// Analyzes Python function bodies.
pub struct BehaviorAnalyzer {
    impure_calls: BTreeSet<String>,
}

impl BehaviorAnalyzer {
    /// Create an analyzer treating calls to `impure_calls` as side effects.
    pub fn new<I, S>(impure_calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            impure_calls: impure_calls.into_iter().map(Into::into).collect(),
        }
    }

    /// Analyze one `function_definition` node.
    pub fn analyze(
        &self,
        parsed: &ParsedFile,
        function: Node,
    ) -> (FunctionBehavior, BTreeMap<String, VariableFlow>) {
        let mut walk = Walk {
            parsed,
            impure_calls: &self.impure_calls,
            behavior: FunctionBehavior {
                pure: true,
                ..Default::default()
            },
            vars: BTreeMap::new(),
            open: Vec::new(),
        };

        walk.behavior.is_async = function.child(0).map_or(false, |c| c.kind() == "async");

        let decl_line = line(function);
        if let Some(params) = function.child_by_field_name("parameters") {
            walk.parameters(params, decl_line);
        }

        if let Some(body) = function.child_by_field_name("body") {
            walk.visit(body);

            let name = function
                .child_by_field_name("name")
                .map(|n| parsed.node_text(n))
                .unwrap_or("");
            // Textual self-reference: over-approximates real recursion.
            walk.behavior.is_recursive =
                !name.is_empty() && word_end(parsed.node_text(body), name).is_some();
        }

        (walk.behavior, walk.vars)
    }
}

struct Walk<'a> {
    parsed: &'a ParsedFile,
    impure_calls: &'a BTreeSet<String>,
    behavior: FunctionBehavior,
    vars: BTreeMap<String, VariableFlow>,
    /// Indices of the control-flow nodes enclosing the cursor.
    open: Vec<usize>,
}

impl<'a> Walk<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    fn parameters(&mut self, params: Node, decl_line: usize) {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let (name_node, type_node) = match param.kind() {
                "identifier" => (Some(param), None),
                "typed_parameter" => (
                    first_identifier(param),
                    param.child_by_field_name("type"),
                ),
                "default_parameter" | "typed_default_parameter" => (
                    param.child_by_field_name("name"),
                    param.child_by_field_name("type"),
                ),
                "list_splat_pattern" | "dictionary_splat_pattern" => (first_identifier(param), None),
                _ => (None, None),
            };
            if let Some(name_node) = name_node {
                let name = self.text(name_node).to_string();
                let mut flow = VariableFlow::new(&name, FlowScope::Parameter);
                flow.assignments.push(decl_line);
                flow.type_hint = type_node.map(|t| self.text(t).to_string());
                self.vars.insert(name, flow);
            }
        }
    }

    fn side_effect(&mut self, effect: String) {
        self.behavior.pure = false;
        if !self.behavior.side_effects.contains(&effect) {
            self.behavior.side_effects.push(effect);
        }
    }

    fn push_flow(&mut self, line: usize, kind: FlowKind) -> usize {
        let node = ControlFlowNode {
            line,
            kind,
            condition: None,
            true_branch: BTreeSet::new(),
            false_branch: BTreeSet::new(),
            parent: self.open.last().copied(),
        };
        self.behavior.control_flow.push(node);
        self.behavior.control_flow.len() - 1
    }

    fn bind(&mut self, name: &str, line: usize) {
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| VariableFlow::new(name, FlowScope::Local))
            .assignments
            .push(line);
    }

    fn read(&mut self, ident: Node) {
        let name = self.text(ident);
        if BUILTINS.contains(name) {
            return;
        }
        let line = line(ident);
        match self.vars.get_mut(name) {
            Some(flow) => flow.reads.push(line),
            None => {
                let mut flow = VariableFlow::new(name, FlowScope::Global);
                flow.reads.push(line);
                self.vars.insert(name.to_string(), flow);
                self.side_effect(format!("Uses global variable {}", name));
            }
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_field(&mut self, node: Node, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "identifier" => self.read(node),
            "comment" | "type" => {}
            "function_definition" | "class_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(self.text(name), line(name));
                }
            }
            "lambda" => {
                if let Some(params) = node.child_by_field_name("parameters") {
                    let mut cursor = params.walk();
                    let names: Vec<Node> = params
                        .named_children(&mut cursor)
                        .filter_map(|p| if p.kind() == "identifier" { Some(p) } else { first_identifier(p) })
                        .collect();
                    for name in names {
                        self.bind(self.text(name), line(name));
                    }
                }
                self.visit_field(node, "body");
            }
            "call" => self.call(node),
            "keyword_argument" => self.visit_field(node, "value"),
            "attribute" => self.visit_field(node, "object"),
            "assignment" => {
                self.visit_field(node, "right");
                if node.child_by_field_name("right").is_some() {
                    if let Some(left) = node.child_by_field_name("left") {
                        self.store(left);
                    }
                }
            }
            "augmented_assignment" => {
                self.visit_field(node, "right");
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        self.read(left);
                    }
                    self.store(left);
                }
            }
            "named_expression" => {
                self.visit_field(node, "value");
                if let Some(name) = node.child_by_field_name("name") {
                    self.store(name);
                }
            }
            "as_pattern" => {
                if let Some(value) = node.named_child(0) {
                    self.visit(value);
                }
                if let Some(alias) = node.child_by_field_name("alias") {
                    self.store(alias);
                }
            }
            "global_statement" | "nonlocal_statement" => self.declaration(node),
            "import_statement" | "import_from_statement" => self.import_bindings(node),
            "if_statement" => self.if_statement(node),
            "for_statement" => self.for_statement(node),
            "while_statement" => self.while_statement(node),
            "try_statement" => self.try_statement(node),
            "return_statement" => self.return_statement(node),
            "raise_statement" => {
                if let Some(exception) = node.named_child(0) {
                    if let Some(name) = exception_name(self.parsed, exception) {
                        self.behavior.raises.insert(name);
                    }
                }
                self.visit_children(node);
            }
            "yield" => {
                self.behavior.is_generator = true;
                self.visit_children(node);
            }
            "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression" => self.comprehension(node),
            _ => self.visit_children(node),
        }
    }

    fn store(&mut self, target: Node) {
        match target.kind() {
            "identifier" => {
                let name = self.text(target);
                self.bind(name, line(target));
                match self.vars.get(name).map(|flow| flow.scope) {
                    Some(FlowScope::Global) => {
                        self.side_effect(format!("Modifies global variable {}", name))
                    }
                    Some(FlowScope::Nonlocal) => {
                        self.side_effect(format!("Modifies nonlocal variable {}", name))
                    }
                    _ => {}
                }
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "parenthesized_expression" | "list_splat_pattern" | "list_splat"
            | "as_pattern_target" => {
                let mut cursor = target.walk();
                let children: Vec<Node> = target.named_children(&mut cursor).collect();
                for child in children {
                    self.store(child);
                }
            }
            _ => self.visit(target),
        }
    }

    fn call(&mut self, node: Node) {
        if let Some(function) = node.child_by_field_name("function") {
            let callee = match function.kind() {
                "identifier" => Some(self.text(function)),
                "attribute" => {
                    self.visit_field(function, "object");
                    function.child_by_field_name("attribute").map(|a| self.text(a))
                }
                _ => {
                    self.visit(function);
                    None
                }
            };
            if let Some(callee) = callee {
                if self.impure_calls.contains(callee) {
                    self.side_effect(format!("Calls {}", callee));
                }
            }
        }
        self.visit_field(node, "arguments");
    }

    fn declaration(&mut self, node: Node) {
        let (scope, verb) = if node.kind() == "global_statement" {
            (FlowScope::Global, "global")
        } else {
            (FlowScope::Nonlocal, "nonlocal")
        };
        let mut cursor = node.walk();
        let names: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "identifier")
            .collect();
        for ident in names {
            let name = self.text(ident);
            self.vars
                .entry(name.to_string())
                .or_insert_with(|| VariableFlow::new(name, scope))
                .scope = scope;
            self.side_effect(format!("Modifies {} variable {}", verb, name));
        }
    }

    fn import_bindings(&mut self, node: Node) {
        let mut cursor = node.walk();
        let items: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for item in items {
            let bound = match item.kind() {
                "aliased_import" => item.child_by_field_name("alias"),
                "dotted_name" => item.named_child(0),
                _ => None,
            };
            if let Some(bound) = bound {
                self.bind(self.text(bound), line(bound));
            }
        }
    }

    fn comprehension(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for clause in children.iter().filter(|c| c.kind() == "for_in_clause") {
            self.visit_field(*clause, "right");
            if let Some(left) = clause.child_by_field_name("left") {
                self.store(left);
            }
        }
        for child in children.iter().filter(|c| c.kind() != "for_in_clause") {
            self.visit(*child);
        }
    }

    fn if_statement(&mut self, node: Node) {
        let idx = self.push_flow(line(node), FlowKind::If);
        let condition = node.child_by_field_name("condition");
        self.behavior.control_flow[idx].condition = condition.map(|c| self.text(c).to_string());
        self.behavior.control_flow[idx].true_branch =
            node.child_by_field_name("consequence").map(statement_lines).unwrap_or_default();

        let mut cursor = node.walk();
        let alternatives: Vec<Node> = node.children_by_field_name("alternative", &mut cursor).collect();
        for alt in &alternatives {
            let lines = match alt.kind() {
                "elif_clause" => BTreeSet::from([line(*alt)]),
                _ => alt.child_by_field_name("body").map(statement_lines).unwrap_or_default(),
            };
            self.behavior.control_flow[idx].false_branch.extend(lines);
        }

        self.open.push(idx);
        if let Some(condition) = condition {
            self.visit(condition);
        }
        self.visit_field(node, "consequence");
        for alt in alternatives {
            if alt.kind() == "elif_clause" {
                let elif = self.push_flow(line(alt), FlowKind::If);
                let condition = alt.child_by_field_name("condition");
                self.behavior.control_flow[elif].condition =
                    condition.map(|c| self.text(c).to_string());
                self.behavior.control_flow[elif].true_branch =
                    alt.child_by_field_name("consequence").map(statement_lines).unwrap_or_default();
                self.open.push(elif);
                if let Some(condition) = condition {
                    self.visit(condition);
                }
                self.visit_field(alt, "consequence");
                self.open.pop();
            } else {
                self.visit_field(alt, "body");
            }
        }
        self.open.pop();
    }

    fn for_statement(&mut self, node: Node) {
        let idx = self.push_flow(line(node), FlowKind::For);
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");
        if let (Some(l), Some(r)) = (left, right) {
            self.behavior.control_flow[idx].condition =
                Some(format!("for {} in {}", self.text(l), self.text(r)));
        }
        self.behavior.control_flow[idx].true_branch =
            node.child_by_field_name("body").map(statement_lines).unwrap_or_default();
        self.behavior.control_flow[idx].false_branch = node
            .child_by_field_name("alternative")
            .and_then(|alt| alt.child_by_field_name("body"))
            .map(statement_lines)
            .unwrap_or_default();

        if let Some(right) = right {
            self.visit(right);
        }
        if let Some(left) = left {
            self.store(left);
        }
        self.open.push(idx);
        self.visit_field(node, "body");
        self.visit_field(node, "alternative");
        self.open.pop();
    }

    fn while_statement(&mut self, node: Node) {
        let idx = self.push_flow(line(node), FlowKind::While);
        let condition = node.child_by_field_name("condition");
        self.behavior.control_flow[idx].condition = condition.map(|c| self.text(c).to_string());
        self.behavior.control_flow[idx].true_branch =
            node.child_by_field_name("body").map(statement_lines).unwrap_or_default();
        self.behavior.control_flow[idx].false_branch = node
            .child_by_field_name("alternative")
            .and_then(|alt| alt.child_by_field_name("body"))
            .map(statement_lines)
            .unwrap_or_default();

        self.open.push(idx);
        if let Some(condition) = condition {
            self.visit(condition);
        }
        self.visit_field(node, "body");
        self.visit_field(node, "alternative");
        self.open.pop();
    }

    fn try_statement(&mut self, node: Node) {
        let idx = self.push_flow(line(node), FlowKind::Try);
        self.behavior.control_flow[idx].true_branch =
            node.child_by_field_name("body").map(statement_lines).unwrap_or_default();

        self.open.push(idx);
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    self.behavior.control_flow[idx].false_branch.insert(line(child));
                    self.except_clause(child);
                }
                _ => self.visit(child),
            }
        }
        self.open.pop();
    }

    fn except_clause(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        let mut exprs = children.iter().filter(|c| !matches!(c.kind(), "block" | "comment"));

        if let Some(first) = exprs.next() {
            let (types, alias) = if first.kind() == "as_pattern" {
                (first.named_child(0), first.child_by_field_name("alias"))
            } else {
                (Some(*first), None)
            };
            if let Some(types) = types {
                let mut names = BTreeSet::new();
                exception_types(self.parsed, types, &mut names);
                self.behavior.raises.extend(names);
            }
            if let Some(alias) = alias {
                self.store(alias);
            }
        }
        // `except E, name` and `except E as name` without an as_pattern.
        if let Some(second) = exprs.next() {
            self.store(*second);
        }
        for block in children.iter().filter(|c| c.kind() == "block") {
            self.visit(*block);
        }
    }

    fn return_statement(&mut self, node: Node) {
        let return_line = line(node);
        let mut path: Vec<usize> = self
            .behavior
            .control_flow
            .iter()
            .filter(|n| n.kind != FlowKind::Return)
            .map(|n| n.line)
            .collect();
        path.push(return_line);
        self.behavior.return_paths.push(path);
        self.push_flow(return_line, FlowKind::Return);

        if let Some(value) = node.named_child(0) {
            if value.kind() == "call" {
                if let Some(function) = value.child_by_field_name("function") {
                    if function.kind() == "identifier" {
                        self.behavior.exit_points.push(self.text(function).to_string());
                    }
                }
            }
        }
        self.visit_children(node);
    }
}

/// 1-indexed start line of a node.
fn line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Start lines of the statements in a block.
fn statement_lines(block: Node) -> BTreeSet<usize> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .map(line)
        .collect()
}

fn first_identifier(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|n| n.kind() == "identifier");
    found
}

/// Exception type names named by a handler expression.
fn exception_types(parsed: &ParsedFile, node: Node, out: &mut BTreeSet<String>) {
    match node.kind() {
        "identifier" | "attribute" => {
            out.insert(parsed.node_text(node).to_string());
        }
        "tuple" | "parenthesized_expression" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                exception_types(parsed, child, out);
            }
        }
        _ => {}
    }
}

/// The type raised by `raise X` or `raise X(...)`.
fn exception_name(parsed: &ParsedFile, node: Node) -> Option<String> {
    let target = if node.kind() == "call" {
        node.child_by_field_name("function")?
    } else {
        node
    };
    match target.kind() {
        "identifier" | "attribute" => Some(parsed.node_text(target).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PythonExtractor;

    fn analyze(source: &str) -> (FunctionBehavior, BTreeMap<String, VariableFlow>) {
        let parsed = PythonExtractor::new().parse("t.py", source).unwrap();
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        let function = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "function_definition")
            .unwrap();
        BehaviorAnalyzer::new(["print", "open", "write", "input"]).analyze(&parsed, function)
    }

    #[test]
    fn test_pure_function() {
        let (behavior, vars) = analyze("def add(a, b: int):\n    total = a + b\n    return total\n");
        assert!(behavior.pure);
        assert!(behavior.side_effects.is_empty());
        assert_eq!(vars["a"].scope, FlowScope::Parameter);
        assert_eq!(vars["a"].assignments, vec![1]);
        assert_eq!(vars["a"].reads, vec![2]);
        assert_eq!(vars["b"].type_hint.as_deref(), Some("int"));
        assert_eq!(vars["total"].scope, FlowScope::Local);
        assert_eq!(vars["total"].assignments, vec![2]);
        assert_eq!(vars["total"].reads, vec![3]);
        assert_eq!(behavior.return_paths, vec![vec![3]]);
    }

    #[test]
    fn test_impure_call_flips_purity_once() {
        let (behavior, _) = analyze("def add(a, b):\n    print(a)\n    return a + b\n");
        assert!(!behavior.pure);
        assert_eq!(behavior.side_effects, vec!["Calls print"]);

        let (behavior, _) = analyze("def save(f, data):\n    f.write(data)\n    f.write(data)\n");
        assert_eq!(behavior.side_effects, vec!["Calls write"]);
    }

    #[test]
    fn test_global_reads_and_declarations() {
        let (behavior, vars) = analyze("def scaled(x):\n    return x * FACTOR\n");
        assert!(!behavior.pure);
        assert_eq!(behavior.side_effects, vec!["Uses global variable FACTOR"]);
        assert_eq!(vars["FACTOR"].scope, FlowScope::Global);
        assert_eq!(vars["FACTOR"].reads, vec![2]);

        let (behavior, vars) = analyze("def bump():\n    global counter\n    counter += 1\n");
        assert_eq!(vars["counter"].scope, FlowScope::Global);
        assert_eq!(vars["counter"].assignments, vec![3]);
        assert_eq!(behavior.side_effects, vec!["Modifies global variable counter"]);
    }

    #[test]
    fn test_builtins_and_call_targets_are_not_globals() {
        let (behavior, _) = analyze("def f(xs):\n    return helper(len(xs), sorted(xs))\n");
        assert!(behavior.pure);
        assert_eq!(behavior.exit_points, vec!["helper"]);
    }

    #[test]
    fn test_control_flow_and_return_paths() {
        let source = r#"def classify(n):
    if n < 0:
        return "neg"
    for i in range(n):
        if i == 3:
            return "three"
    return "pos"
"#;
        let (behavior, _) = analyze(source);
        let kinds: Vec<_> = behavior.control_flow.iter().map(|n| (n.line, n.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, FlowKind::If),
                (3, FlowKind::Return),
                (4, FlowKind::For),
                (5, FlowKind::If),
                (6, FlowKind::Return),
                (7, FlowKind::Return),
            ]
        );
        assert_eq!(behavior.control_flow[0].condition.as_deref(), Some("n < 0"));
        assert_eq!(behavior.control_flow[0].true_branch, BTreeSet::from([3]));
        assert_eq!(behavior.control_flow[1].parent, Some(0));
        assert_eq!(behavior.control_flow[2].condition.as_deref(), Some("for i in range(n)"));
        assert_eq!(behavior.control_flow[3].parent, Some(2));
        assert_eq!(behavior.control_flow[5].parent, None);
        assert_eq!(
            behavior.return_paths,
            vec![vec![2, 3], vec![2, 4, 5, 6], vec![2, 4, 5, 7]]
        );
    }

    #[test]
    fn test_exceptions() {
        let source = r#"def load(path):
    try:
        data = parse(path)
    except (ValueError, KeyError) as err:
        raise RuntimeError(str(err))
    except OSError:
        data = None
    return data
"#;
        let (behavior, vars) = analyze(source);
        let raises: Vec<_> = behavior.raises.iter().map(String::as_str).collect();
        assert_eq!(raises, vec!["KeyError", "OSError", "RuntimeError", "ValueError"]);
        assert_eq!(vars["err"].scope, FlowScope::Local);
        assert_eq!(vars["data"].assignments, vec![3, 7]);
        let try_node = &behavior.control_flow[0];
        assert_eq!(try_node.kind, FlowKind::Try);
        assert_eq!(try_node.false_branch, BTreeSet::from([4, 6]));
        assert!(behavior.pure);
    }

    #[test]
    fn test_generator_recursion_async() {
        let (behavior, _) = analyze(
            "def walk(node):\n    yield node\n    for child in node.children:\n        yield from walk(child)\n",
        );
        assert!(behavior.is_generator);
        assert!(behavior.is_recursive);
        assert!(!behavior.is_async);

        let (behavior, _) = analyze("async def fetch(url):\n    return await get(url)\n");
        assert!(behavior.is_async);
        assert!(!behavior.is_recursive);
        assert!(!behavior.is_generator);
    }

    #[test]
    fn test_comprehension_and_lambda_bindings() {
        let (behavior, vars) = analyze(
            "def pick(xs):\n    ys = [x * 2 for x in xs if x]\n    return sorted(ys, key=lambda k: -k)\n",
        );
        assert!(behavior.pure, "{:?}", behavior.side_effects);
        assert_eq!(vars["x"].scope, FlowScope::Local);
        assert_eq!(vars["k"].scope, FlowScope::Local);
    }
}
