//! JavaScript and TypeScript line scanner.
//!
//! Recognizes ES module and CommonJS imports, function declarations,
//! arrow and function-expression bindings, classes with their members,
//! and (in typed mode) interfaces, type aliases and enums. Function bodies
//! are skipped as whole blocks; only top-level and class-member
//! declarations are extracted.

use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::scan::{
    colon_params, doc_comment_before, find_block, gather_parens, paren_contents,
    statement_end, word_end, Scope, SourceText,
};
use crate::extract::{Extraction, LanguageExtractor};
use crate::language::Language;
use crate::model::{
    merge_variable, Class, Function, Import, SourceLocation, TypeKind, Variable, VariableScope,
};

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "static", "readonly", "abstract", "async", "override",
    "get", "set", "declare", "accessor",
];

/// Words that look like calls or members but never name a declaration.
const NOT_A_NAME: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "typeof", "new", "delete",
    "await", "yield", "super", "import", "else", "do", "try", "throw",
];

lazy_static! {
    static ref IMPORT_FROM: Regex =
        Regex::new(r#"^import\s+(?:type\s+)?([\s\S]+?)\s+from\s+['"]([^'"]+)['"]"#).unwrap();
    static ref IMPORT_BARE: Regex = Regex::new(r#"^import\s+['"]([^'"]+)['"]"#).unwrap();
    static ref EXPORT_FROM: Regex = Regex::new(
        r#"^export\s+(?:type\s+)?(\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#
    )
    .unwrap();
    static ref REQUIRE: Regex = Regex::new(
        r#"(?:(?:const|let|var)\s+([\w$]+|\{[^}]*\})\s*=\s*)?require\(\s*['"]([^'"]+)['"]\s*\)"#
    )
    .unwrap();
    static ref SPECIFIER_END: Regex = Regex::new(r#"(?:from\s+|^import\s+)['"][^'"]+['"]"#).unwrap();

    static ref FUNCTION: Regex = Regex::new(
        r"^(async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)?\s*(?:<[^(]*>)?\s*\("
    )
    .unwrap();
    static ref CLASS: Regex =
        Regex::new(r"^(abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref EXTENDS: Regex = Regex::new(r"\bextends\s+([\w$.]+(?:<[^{]*?>)?)").unwrap();
    static ref IMPLEMENTS: Regex = Regex::new(r"\bimplements\s+([^{]+)").unwrap();
    static ref INTERFACE: Regex = Regex::new(r"^interface\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref INTERFACE_EXTENDS: Regex = Regex::new(r"\bextends\s+([^{]+)").unwrap();
    static ref TYPE_ALIAS: Regex =
        Regex::new(r"^type\s+([A-Za-z_$][\w$]*)\s*(?:<[^=]*>)?\s*=").unwrap();
    static ref ENUM: Regex = Regex::new(r"^(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref BINDING: Regex = Regex::new(
        r"^(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*([^=]+?))?\s*=\s*(.*)$"
    )
    .unwrap();
    static ref ARROW: Regex = Regex::new(
        r"^(async\s+)?(?:<[^>]*>\s*)?(\([^)]*\)?|[A-Za-z_$][\w$]*)\s*(?::\s*[^=]+?)?\s*=>"
    )
    .unwrap();
    static ref FUNCTION_EXPR: Regex = Regex::new(r"^(async\s+)?function\b").unwrap();
    static ref DECORATOR: Regex = Regex::new(r"^@([\w$.]+)").unwrap();

    static ref METHOD: Regex = Regex::new(
        r"^((?:(?:public|private|protected|static|readonly|abstract|async|override|get|set|declare)\s+)*)\*?\s*(#?[A-Za-z_$][\w$]*)\s*[?!]?\s*(?:<[^(]*>)?\s*\("
    )
    .unwrap();
    static ref FIELD: Regex = Regex::new(
        r"^((?:(?:public|private|protected|static|readonly|abstract|override|declare|accessor)\s+)*)(#?[A-Za-z_$][\w$]*)\s*[?!]?\s*(?::\s*([^=;]+?))?\s*(?:=\s*(.*?))?;?$"
    )
    .unwrap();
    static ref THIS_ASSIGN: Regex =
        Regex::new(r"\bthis\.([A-Za-z_$][\w$]*)\s*(?:=[^=>]|=$)").unwrap();
    static ref ENUM_MEMBER: Regex = Regex::new(r"^([A-Za-z_$][\w$]*)\s*(?:=\s*([^,]+))?,?$").unwrap();
}

/// Scanner for `.js`/`.jsx` and, with `typescript` set, `.ts`/`.tsx`.
pub struct ScriptExtractor {
    typescript: bool,
}

impl ScriptExtractor {
    pub fn new(typescript: bool) -> Self {
        Self { typescript }
    }

    pub fn is_typescript(&self) -> bool {
        self.typescript
    }

    fn imports(&self, path: &str, text: &SourceText) -> Vec<Import> {
        let mut imports = Vec::new();
        let mut i = 0;

        while i < text.len() {
            let code = text.code[i].trim_start();
            let starts_module_stmt = code.starts_with("import ") || code.starts_with("import{")
                || code.starts_with("export ");

            if starts_module_stmt {
                // Gather a multi-line statement up to its module specifier.
                let mut end = i;
                let mut joined = text.lines[i].trim().to_string();
                while !SPECIFIER_END.is_match(&joined)
                    && end + 1 < text.len()
                    && end - i < 16
                    && code.contains('{')
                    && !text.code[end].contains('}')
                {
                    end += 1;
                    joined.push(' ');
                    joined.push_str(text.lines[end].trim());
                }
                let location = SourceLocation::new(path, i + 1, end + 1);

                if let Some(caps) = IMPORT_FROM.captures(&joined) {
                    imports.push(es_import(&caps[1], &caps[2], location));
                    i = end + 1;
                    continue;
                } else if let Some(caps) = IMPORT_BARE.captures(&joined) {
                    imports.push(Import::new(&caps[1], location));
                    i = end + 1;
                    continue;
                } else if let Some(caps) = EXPORT_FROM.captures(&joined) {
                    imports.push(es_import(&caps[1], &caps[2], location));
                    i = end + 1;
                    continue;
                }
            }

            if text.code[i].contains("require(") {
                for caps in REQUIRE.captures_iter(&text.lines[i]) {
                    let mut import = Import::new(&caps[2], SourceLocation::line(path, i + 1));
                    if let Some(binding) = caps.get(1) {
                        let binding = binding.as_str();
                        if binding.starts_with('{') {
                            import.names = brace_names(binding);
                            import.is_qualified_import = true;
                        } else {
                            import.alias = Some(binding.to_string());
                        }
                    }
                    imports.push(import);
                }
            }
            i += 1;
        }

        imports
    }

    /// Scan top-level declarations.
    fn scan(&self, path: &str, text: &SourceText, out: &mut Extraction) {
        let scope = Scope::root();
        let mut decorators: Vec<String> = Vec::new();
        let mut i = 0;

        while i < text.len() {
            let raw = text.code[i].trim();
            if raw.is_empty() {
                i += 1;
                continue;
            }
            if DECORATOR.is_match(raw) {
                decorators.push(text.lines[i].trim().trim_start_matches('@').to_string());
                i += 1;
                continue;
            }

            let (exported_default, line) = strip_export(raw);

            if let Some(caps) = FUNCTION.captures(line) {
                let name = caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| if exported_default { "default".into() } else { String::new() });
                let block = find_block(&text.code, i);
                if !name.is_empty() {
                    let mut f = self.function(path, text, &name, i, block.end, &scope);
                    f.is_async = caps.get(1).is_some();
                    f.decorators = std::mem::take(&mut decorators);
                    out.functions.push(f);
                }
                i = block.end + 1;
                continue;
            }

            if let Some(caps) = CLASS.captures(line) {
                let block = find_block(&text.code, i);
                let mut class = Class::new(
                    &caps[2],
                    TypeKind::Class,
                    SourceLocation::new(path, i + 1, block.end + 1),
                );
                if caps.get(1).is_some() {
                    class.modifiers.push("abstract".to_string());
                }
                let header = header_text(text, i, block.open.unwrap_or(i));
                if let Some(ext) = EXTENDS.captures(&header) {
                    class.bases.push(ext[1].trim().to_string());
                }
                if let Some(imp) = IMPLEMENTS.captures(&header) {
                    class.bases.extend(split_names(&imp[1]));
                }
                class.decorators = std::mem::take(&mut decorators);
                if let Some(doc) = doc_comment_before(&text.lines, i) {
                    class.docstring = Some(doc.description);
                }
                let inner = scope.push(&class.name);
                self.class_members(path, text, block.inner(), &inner, &mut class);
                out.classes.push(class);
                i = block.end + 1;
                continue;
            }

            if self.typescript {
                if let Some(caps) = INTERFACE.captures(line) {
                    let block = find_block(&text.code, i);
                    let mut class = Class::new(
                        &caps[1],
                        TypeKind::Interface,
                        SourceLocation::new(path, i + 1, block.end + 1),
                    );
                    let header = header_text(text, i, block.open.unwrap_or(i));
                    if let Some(ext) = INTERFACE_EXTENDS.captures(&header) {
                        class.bases = split_names(&ext[1]);
                    }
                    let inner = scope.push(&class.name);
                    self.interface_members(path, text, block.inner(), &inner, &mut class);
                    out.classes.push(class);
                    i = block.end + 1;
                    continue;
                }
                if let Some(caps) = TYPE_ALIAS.captures(line) {
                    let end = statement_end(&text.code, i);
                    let class = Class::new(
                        &caps[1],
                        TypeKind::TypeAlias,
                        SourceLocation::new(path, i + 1, end + 1),
                    );
                    out.classes.push(class);
                    i = end + 1;
                    continue;
                }
                if let Some(caps) = ENUM.captures(line) {
                    let block = find_block(&text.code, i);
                    let mut class = Class::new(
                        &caps[1],
                        TypeKind::Enum,
                        SourceLocation::new(path, i + 1, block.end + 1),
                    );
                    for j in block.inner() {
                        if let Some(m) = ENUM_MEMBER.captures(text.code[j].trim()) {
                            let mut var = Variable::new(
                                &m[1],
                                VariableScope::Class,
                                SourceLocation::line(path, j + 1),
                            );
                            let member = text.code[j].trim();
                            var.value = m.get(2).map(|v| text.raw_fragment(j, member, v.range()));
                            merge_variable(&mut class.class_variables, var);
                        }
                    }
                    out.classes.push(class);
                    i = block.end + 1;
                    continue;
                }
            }

            if let Some(caps) = BINDING.captures(line) {
                let name = caps[2].to_string();
                let rest = caps.get(4).map(|m| m.as_str().trim()).unwrap_or("");
                let end = statement_end(&text.code, i);

                if let Some(arrow) = ARROW.captures(rest) {
                    let mut f = self.function(path, text, &name, i, end, &scope);
                    f.is_async = arrow.get(1).is_some();
                    if !arrow[2].starts_with('(') {
                        f.params = colon_params(&arrow[2]);
                    }
                    f.decorators = std::mem::take(&mut decorators);
                    out.functions.push(f);
                } else if let Some(expr) = FUNCTION_EXPR.captures(rest) {
                    let mut f = self.function(path, text, &name, i, end, &scope);
                    f.is_async = expr.get(1).is_some();
                    out.functions.push(f);
                } else {
                    let mut var = Variable::new(
                        &name,
                        VariableScope::Module,
                        SourceLocation::new(path, i + 1, end + 1),
                    );
                    var.type_hint = caps.get(3).map(|t| t.as_str().trim().to_string());
                    if let Some(value) = caps.get(4) {
                        let raw_value = text.raw_fragment(i, line, value.range());
                        let raw_value = raw_value.trim().trim_end_matches(';').trim();
                        if !raw_value.is_empty() {
                            var.value = Some(raw_value.to_string());
                        }
                    }
                    merge_variable(&mut out.variables, var);
                }
                decorators.clear();
                i = end + 1;
                continue;
            }

            decorators.clear();
            i += 1;
        }
    }

    /// Build a function from the header at `start`, covering lines through `end`.
    fn function(
        &self,
        path: &str,
        text: &SourceText,
        name: &str,
        start: usize,
        end: usize,
        scope: &Scope,
    ) -> Function {
        let mut f = Function::new(name, SourceLocation::new(path, start + 1, end + 1));
        f.scope = scope.qualifier();

        let header_lines = &text.code[..=end.min(text.len().saturating_sub(1))];
        if let Some((header, _)) = gather_parens(header_lines, start) {
            // The first group after the name; skip type parameters.
            let from = word_end(&header, name).unwrap_or(0);
            if let Some((params, close)) = paren_contents(&header[from..]) {
                f.params = colon_params(&params);
                let after = header[from + close + 1..].trim_start();
                if self.typescript {
                    if let Some(ret) = after.strip_prefix(':') {
                        let ret = ret.split("=>").next().unwrap_or(ret);
                        let ret = ret.split('{').next().unwrap_or(ret).trim();
                        let ret = ret.trim_end_matches(';').trim();
                        if !ret.is_empty() {
                            f.returns = Some(ret.to_string());
                        }
                    }
                }
            }
        }

        if let Some(doc) = doc_comment_before(&text.lines, start) {
            doc.apply(&mut f);
        }
        f
    }

    fn class_members(
        &self,
        path: &str,
        text: &SourceText,
        range: std::ops::Range<usize>,
        scope: &Scope,
        class: &mut Class,
    ) {
        let mut decorators: Vec<String> = Vec::new();
        let mut j = range.start;

        while j < range.end {
            let line = text.code[j].trim();
            if line.is_empty() || line == ";" {
                j += 1;
                continue;
            }
            if DECORATOR.is_match(line) {
                decorators.push(text.lines[j].trim().trim_start_matches('@').to_string());
                j += 1;
                continue;
            }

            if let Some(caps) = METHOD.captures(line) {
                let name = caps[2].to_string();
                if !NOT_A_NAME.contains(&name.as_str()) {
                    let block = find_block(&text.code, j);
                    let end = block.end.min(range.end.saturating_sub(1)).max(j);
                    let mut method = self.function(path, text, &name, j, end, scope);
                    method.modifiers = member_modifiers(&caps[1], &name);
                    method.is_async = method.has_modifier("async");
                    method.decorators = std::mem::take(&mut decorators);
                    collect_this_assignments(path, text, j..end + 1, class);
                    class.methods.push(method);
                    j = end + 1;
                    continue;
                }
            }

            if let Some(caps) = FIELD.captures(line) {
                let name = caps[2].to_string();
                let end = statement_end(&text.code, j).min(range.end.saturating_sub(1)).max(j);
                let value = caps.get(4).map(|v| v.as_str().trim()).unwrap_or("");
                let modifiers = member_modifiers(&caps[1], &name);

                if let Some(arrow) = ARROW.captures(value) {
                    let mut method = self.function(path, text, &name, j, end, scope);
                    method.modifiers = modifiers;
                    method.is_async = arrow.get(1).is_some();
                    method.decorators = std::mem::take(&mut decorators);
                    collect_this_assignments(path, text, j..end + 1, class);
                    class.methods.push(method);
                } else if !NOT_A_NAME.contains(&name.as_str()) {
                    let mut var = Variable::new(
                        &name,
                        VariableScope::Class,
                        SourceLocation::new(path, j + 1, end + 1),
                    );
                    var.type_hint = caps.get(3).map(|t| t.as_str().trim().to_string());
                    if let Some(v) = caps.get(4) {
                        let raw = text.raw_fragment(j, line, v.range());
                        let raw = raw.trim().trim_end_matches(';').trim();
                        if !raw.is_empty() {
                            var.value = Some(raw.to_string());
                        }
                    }
                    if modifiers.iter().any(|m| m == "static") {
                        merge_variable(&mut class.class_variables, var);
                    } else {
                        merge_variable(&mut class.instance_variables, var);
                    }
                }
                decorators.clear();
                j = end + 1;
                continue;
            }

            decorators.clear();
            j += 1;
        }
    }

    fn interface_members(
        &self,
        path: &str,
        text: &SourceText,
        range: std::ops::Range<usize>,
        scope: &Scope,
        class: &mut Class,
    ) {
        for j in range {
            let line = text.code[j].trim();
            if let Some(caps) = METHOD.captures(line) {
                let name = caps[2].to_string();
                if !NOT_A_NAME.contains(&name.as_str()) {
                    let method = self.function(path, text, &name, j, j, scope);
                    class.methods.push(method);
                    continue;
                }
            }
            if let Some(caps) = FIELD.captures(line) {
                let mut var = Variable::new(
                    &caps[2],
                    VariableScope::Class,
                    SourceLocation::line(path, j + 1),
                );
                var.type_hint = caps.get(3).map(|t| t.as_str().trim().to_string());
                merge_variable(&mut class.instance_variables, var);
            }
        }
    }
}

impl LanguageExtractor for ScriptExtractor {
    fn language(&self) -> Language {
        if self.typescript {
            Language::TypeScript
        } else {
            Language::JavaScript
        }
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        let text = SourceText::new(content, true);
        let mut out = Extraction {
            imports: self.imports(path, &text),
            ..Default::default()
        };
        self.scan(path, &text, &mut out);
        out
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        let text = SourceText::new(content, true);
        let mut deps: Vec<String> = Vec::new();
        for import in self.imports("", &text) {
            if import.module.starts_with('.') && !deps.contains(&import.module) {
                deps.push(import.module);
            }
        }
        deps
    }
}

/// Strip `export`, `export default` and `declare` prefixes.
fn strip_export(line: &str) -> (bool, &str) {
    let mut rest = line;
    let mut default = false;
    if let Some(r) = rest.strip_prefix("export ") {
        rest = r.trim_start();
        if let Some(r) = rest.strip_prefix("default ") {
            rest = r.trim_start();
            default = true;
        }
    }
    if let Some(r) = rest.strip_prefix("declare ") {
        rest = r.trim_start();
    }
    (default, rest)
}

/// Build an import from an ES import clause and module specifier.
fn es_import(clause: &str, module: &str, location: SourceLocation) -> Import {
    let mut import = Import::new(module, location);
    let clause = clause.trim();

    if let Some(ns) = clause.split("* as ").nth(1) {
        import.alias = Some(ns.trim().trim_end_matches(',').trim().to_string());
        import.names.push("*".to_string());
    } else if clause == "*" {
        import.names.push("*".to_string());
    }

    if let Some(open) = clause.find('{') {
        let default = clause[..open].trim().trim_end_matches(',').trim();
        if !default.is_empty() && !default.contains('*') {
            import.names.push(default.to_string());
        }
        import.names.extend(brace_names(&clause[open..]));
        import.is_qualified_import = true;
    } else if !clause.contains('*') {
        let default = clause.trim_end_matches(',').trim();
        if !default.is_empty() {
            import.names.push(default.to_string());
        }
    }
    import
}

/// Names inside `{ a, b as c, type d }`.
fn brace_names(text: &str) -> Vec<String> {
    text.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|n| {
            let n = n.trim().trim_start_matches("type ").trim();
            let n = n.split(" as ").next().unwrap_or(n).trim();
            let n = n.split(':').next().unwrap_or(n).trim();
            if n.is_empty() {
                None
            } else {
                Some(n.to_string())
            }
        })
        .collect()
}

fn split_names(text: &str) -> Vec<String> {
    crate::extract::scan::split_params(text)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn member_modifiers(prefix: &str, name: &str) -> Vec<String> {
    let mut modifiers: Vec<String> = prefix
        .split_whitespace()
        .filter(|w| MEMBER_MODIFIERS.contains(w))
        .map(str::to_string)
        .collect();
    if name.starts_with('#') && !modifiers.iter().any(|m| m == "private") {
        modifiers.push("private".to_string());
    }
    modifiers
}

/// Header lines of a declaration joined, for inheritance clauses.
fn header_text(text: &SourceText, start: usize, open: usize) -> String {
    text.code[start..=open.max(start).min(text.len().saturating_sub(1))]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `this.x = ...` assignments on `lines` become instance variables.
fn collect_this_assignments(
    path: &str,
    text: &SourceText,
    lines: std::ops::Range<usize>,
    class: &mut Class,
) {
    for k in lines {
        let Some(code) = text.code.get(k) else {
            break;
        };
        for this in THIS_ASSIGN.captures_iter(code) {
            merge_variable(
                &mut class.instance_variables,
                Variable::new(&this[1], VariableScope::Class, SourceLocation::line(path, k + 1)),
            );
        }
    }
}
