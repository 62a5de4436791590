//! C and C++ line scanner.
//!
//! Handles `#include` directives, namespaces, class/struct/union/enum
//! definitions with access sections, free functions, methods, out-of-line
//! `Type::member` definitions, prototypes, fields and globals. Function
//! bodies are skipped whole.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::scan::{
    doc_comment_before, find_block, gather_parens, paren_contents, split_params, strip_default,
    word_end, Scope, SourceText,
};
use crate::extract::{Extraction, LanguageExtractor};
use crate::language::Language;
use crate::model::{
    merge_variable, Class, Function, Import, Parameter, SourceLocation, TypeKind, Variable,
    VariableScope,
};

/// Leading words that rule a line out as a declaration.
const NOT_A_NAME: &[&str] = &[
    "if", "for", "while", "switch", "return", "sizeof", "catch", "new", "delete", "throw",
    "static_assert", "decltype", "alignof", "typeid", "case", "do", "else", "goto", "using",
    "typedef", "friend", "namespace", "template", "break", "continue", "co_return", "co_yield",
    "co_await", "defined", "public", "private", "protected", "operator",
];

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "union", "enum"];

lazy_static! {
    static ref INCLUDE: Regex = Regex::new(r#"^#\s*include\s*([<"])([^>"]+)[>"]"#).unwrap();
    static ref NAMESPACE: Regex =
        Regex::new(r"^(?:inline\s+)?namespace(?:\s+([A-Za-z_][\w:]*))?\s*(?:\{.*)?$").unwrap();
    static ref EXTERN_C: Regex = Regex::new(r#"^extern\s+"[^"]*"\s*\{"#).unwrap();
    static ref TYPE_HEAD: Regex =
        Regex::new(r"^(typedef\s+)?(class|struct|union|enum)\b").unwrap();
    static ref TYPEDEF_NAME: Regex = Regex::new(r"\}\s*\**\s*([A-Za-z_]\w*)\s*[,;\[]").unwrap();
    static ref USING_ALIAS: Regex = Regex::new(r"^using\s+([A-Za-z_]\w*)\s*=").unwrap();
    static ref TYPEDEF: Regex = Regex::new(r"^typedef\s+[^;()]*?\b([A-Za-z_]\w*)\s*;$").unwrap();
    static ref ACCESS: Regex =
        Regex::new(r"^(public|protected|private)\s*(?:slots|Q_SLOTS)?\s*:(?:[^:]|$)").unwrap();
    static ref SIGNALS: Regex = Regex::new(r"^(?:signals|Q_SIGNALS)\s*:").unwrap();
    static ref FUNC_SIG: Regex = Regex::new(
        r"^(?P<prefix>(?:(?:static|inline|virtual|explicit|extern|constexpr|consteval|__forceinline)\s+)*)(?P<ret>(?:[\w:<>,\*&]+[\s\*&]+)*?)(?P<name>(?:[A-Za-z_]\w*(?:<[^()]*?>)?::)*(?:~?[A-Za-z_]\w*|operator\s*(?:\(\)|[^\s(]+)))\s*\("
    )
    .unwrap();
    static ref TRAILING_RETURN: Regex = Regex::new(r"->\s*([^{;]+)").unwrap();
    static ref VARIABLE: Regex = Regex::new(
        r"^(?P<prefix>(?:(?:static|extern|const|constexpr|inline|mutable|volatile|thread_local)\s+)*)(?P<type>[A-Za-z_][\w:]*(?:<[^;()]*>)?(?:\s+[A-Za-z_][\w:]*(?:<[^;()]*>)?)*?)(?:\s*[\*&]+\s*|\s+)(?P<name>[A-Za-z_]\w*)\s*(?:\[[^\]]*\]\s*)*(?:=\s*(?P<value>.+?)|\{(?P<init>.*)\})?\s*;$"
    )
    .unwrap();
    static ref ENUMERATOR: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*(?:=\s*(.+))?$").unwrap();
}

/// Scanner for `.c`, `.cpp` and `.h` files.
pub struct CppExtractor;

/// Per-file inputs shared by the scan functions.
struct Ctx<'a> {
    path: &'a str,
    text: &'a SourceText,
}

impl CppExtractor {
    fn includes(&self, path: &str, text: &SourceText) -> Vec<Import> {
        let mut imports = Vec::new();
        for (i, raw) in text.lines.iter().enumerate() {
            // The code view keeps directives but blanks commented-out ones.
            if !text.code[i].trim_start().starts_with('#') {
                continue;
            }
            if let Some(caps) = INCLUDE.captures(raw.trim()) {
                imports.push(Import::new(&caps[2], SourceLocation::line(path, i + 1)));
            }
        }
        imports
    }

    fn scan_scope(&self, cx: &Ctx, range: Range<usize>, scope: &Scope, out: &mut Extraction) {
        let code = &cx.text.code;
        let mut template_line: Option<usize> = None;
        let mut i = range.start;

        while i < range.end {
            let t = code[i].trim();
            if t.is_empty() || t.starts_with('#') || t == ";" {
                i += 1;
                continue;
            }
            let line = strip_template(t);
            if line.is_empty() {
                template_line.get_or_insert(i);
                i += 1;
                continue;
            }
            let decl_start = template_line.take().unwrap_or(i);

            if NAMESPACE.is_match(line) {
                let block = find_block(code, i);
                if block.has_body() {
                    let inner = namespace_names(line)
                        .into_iter()
                        .flat_map(|name| name.split("::"))
                        .fold(scope.clone(), |s, part| s.push(part));
                    self.scan_scope(cx, block.inner(), &inner, out);
                }
                i = block.end + 1;
                continue;
            }
            if EXTERN_C.is_match(line) {
                let block = find_block(code, i);
                self.scan_scope(cx, block.inner(), scope, out);
                i = block.end + 1;
                continue;
            }
            if let Some(end) = self.type_decl(cx, i, decl_start, line, scope, out) {
                i = end + 1;
                continue;
            }
            if let Some(alias) = type_alias(cx, i, line, scope) {
                out.classes.push(alias);
                i += 1;
                continue;
            }
            if let Some((f, end)) = self.function(cx, i, decl_start, line, scope, None) {
                out.functions.push(f);
                i = end + 1;
                continue;
            }
            if let Some((var, _)) = variable(cx, i, line, VariableScope::Module) {
                merge_variable(&mut out.variables, var);
                i += 1;
                continue;
            }
            // Unrecognized braced constructs (macro blocks, initializers) are skipped whole.
            if line.contains('{') {
                i = find_block(code, i).end + 1;
                continue;
            }
            i += 1;
        }
    }

    fn scan_class(
        &self,
        cx: &Ctx,
        range: Range<usize>,
        scope: &Scope,
        class: &mut Class,
        default_access: &str,
        out: &mut Extraction,
    ) {
        let code = &cx.text.code;
        let mut access = default_access.to_string();
        let mut template_line: Option<usize> = None;
        let mut i = range.start;

        while i < range.end {
            let t = code[i].trim();
            if t.is_empty() || t.starts_with('#') || t == ";" {
                i += 1;
                continue;
            }
            if let Some(caps) = ACCESS.captures(t) {
                access = caps[1].to_string();
                i += 1;
                continue;
            }
            if SIGNALS.is_match(t) {
                access = "public".to_string();
                i += 1;
                continue;
            }
            let line = strip_template(t);
            if line.is_empty() {
                template_line.get_or_insert(i);
                i += 1;
                continue;
            }
            let decl_start = template_line.take().unwrap_or(i);

            if line.starts_with("friend ") {
                i = find_block(code, i).end.min(range.end) + 1;
                continue;
            }
            if let Some(end) = self.type_decl(cx, i, decl_start, line, scope, out) {
                i = end + 1;
                continue;
            }
            if let Some(alias) = type_alias(cx, i, line, scope) {
                out.classes.push(alias);
                i += 1;
                continue;
            }
            if let Some((mut method, end)) =
                self.function(cx, i, decl_start, line, scope, Some(&class.name))
            {
                method.modifiers.insert(0, access.clone());
                class.methods.push(method);
                i = end.min(range.end.saturating_sub(1)).max(i) + 1;
                continue;
            }
            if let Some((var, is_static)) = variable(cx, i, line, VariableScope::Class) {
                if is_static {
                    merge_variable(&mut class.class_variables, var);
                } else {
                    merge_variable(&mut class.instance_variables, var);
                }
                i += 1;
                continue;
            }
            if line.contains('{') {
                i = find_block(code, i).end.min(range.end.saturating_sub(1)).max(i) + 1;
                continue;
            }
            i += 1;
        }
    }

    /// A class/struct/union/enum definition at line `i`. Returns the last
    /// line consumed, or `None` when the line is not a type definition.
    fn type_decl(
        &self,
        cx: &Ctx,
        i: usize,
        decl_start: usize,
        line: &str,
        scope: &Scope,
        out: &mut Extraction,
    ) -> Option<usize> {
        let caps = TYPE_HEAD.captures(line)?;
        let is_typedef = caps.get(1).is_some();
        let keyword = caps[2].to_string();
        let code = &cx.text.code;

        let block = find_block(code, i);
        let open = match block.open {
            Some(open) => open,
            // Forward declarations and `struct tag var;` fall through.
            None => return None,
        };

        let header: String = code[i..=open]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let header = strip_template(&header);
        let header = header.split('{').next().unwrap_or("");
        if header.contains('(') {
            // A function returning a tagged type.
            return None;
        }

        let rest = &header[TYPE_HEAD.find(header).map(|m| m.end()).unwrap_or(0)..];
        let rest = rest.trim_start();
        let rest = if keyword == "enum" {
            rest.strip_prefix("class ")
                .or_else(|| rest.strip_prefix("struct "))
                .unwrap_or(rest)
        } else {
            rest
        };
        let (name_part, bases_part) = split_single_colon(rest);
        let tag = name_part
            .split_whitespace()
            .filter(|w| *w != "final" && !w.starts_with("[["))
            .last()
            .map(|w| w.split('<').next().unwrap_or(w).to_string());

        let name = if is_typedef {
            TYPEDEF_NAME
                .captures(&code[block.end])
                .map(|c| c[1].to_string())
                .or(tag)
        } else {
            tag
        };
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => return Some(block.end),
        };

        let kind = TypeKind::from_keyword(&keyword).unwrap_or(TypeKind::Struct);
        let mut class = Class::new(
            &name,
            kind,
            SourceLocation::new(cx.path, decl_start + 1, block.end + 1),
        );
        class.scope = scope.qualifier();
        if kind != TypeKind::Enum {
            if let Some(bases) = bases_part {
                class.bases = split_params(bases)
                    .iter()
                    .map(|b| strip_access(b))
                    .filter(|b| !b.is_empty())
                    .collect();
            }
        }
        if let Some(doc) = doc_comment_before(&cx.text.lines, decl_start) {
            class.docstring = Some(doc.description);
        }

        if kind == TypeKind::Enum {
            enumerators(cx, open, block.end, &mut class);
        } else {
            let default_access = if keyword == "class" { "private" } else { "public" };
            let inner = scope.push(&name);
            self.scan_class(cx, block.inner(), &inner, &mut class, default_access, out);
        }
        out.classes.push(class);
        Some(block.end)
    }

    /// A function definition or prototype at line `i`.
    ///
    /// `class_name` is set inside a class body, where constructors and
    /// destructors have no return type.
    fn function(
        &self,
        cx: &Ctx,
        i: usize,
        decl_start: usize,
        line: &str,
        scope: &Scope,
        class_name: Option<&str>,
    ) -> Option<(Function, usize)> {
        if !line.contains('(') {
            return None;
        }
        let caps = FUNC_SIG.captures(line)?;
        let ret = caps["ret"].trim();
        let full_name = caps["name"].split_whitespace().collect::<Vec<_>>().join(" ");

        let first_word = ret.split_whitespace().next().unwrap_or("");
        let (qualifier, bare) = match full_name.rsplit_once("::") {
            Some((q, b)) => (Some(q.to_string()), b.to_string()),
            None => (None, full_name.clone()),
        };
        if NOT_A_NAME.contains(&first_word) || NOT_A_NAME.contains(&bare.as_str()) {
            return None;
        }
        let special = class_name.map_or(false, |c| bare == c || bare == format!("~{}", c))
            || qualifier.is_some()
            || bare.starts_with("operator");
        if ret.is_empty() && !special {
            return None;
        }

        let code = &cx.text.code;
        let (header, _) = gather_parens(code, i)?;
        let header = strip_template(header.trim());
        let from = word_end(header, &full_name)
            .or_else(|| word_end(header, &bare))
            .or_else(|| header.find(&bare).map(|p| p + bare.len()))?;
        let (params, close) = paren_contents(&header[from..])?;
        let after = &header[from + close + 1..];

        let block = find_block(code, i);
        let mut f = Function::new(
            &bare,
            SourceLocation::new(cx.path, decl_start + 1, block.end + 1),
        );
        f.scope = match &qualifier {
            Some(q) => {
                let q = q
                    .split("::")
                    .map(|seg| seg.split('<').next().unwrap_or(seg))
                    .fold(scope.clone(), |s, seg| s.push(seg));
                q.qualifier()
            }
            None => scope.qualifier(),
        };
        f.params = cpp_params(&params);
        f.modifiers = caps["prefix"].split_whitespace().map(str::to_string).collect();

        if let Some(trailing) = TRAILING_RETURN.captures(after) {
            f.returns = Some(trailing[1].trim().to_string());
        } else if !ret.is_empty() {
            f.returns = Some(ret.to_string());
        }

        let suffix = after.split('{').next().unwrap_or("");
        let words: Vec<&str> = suffix
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();
        for word in ["const", "override", "final", "noexcept"] {
            if words.contains(&word) {
                f.modifiers.push(word.to_string());
            }
        }
        let compact: String = suffix.split_whitespace().collect();
        if compact.contains("=0") {
            f.modifiers.push("pure".to_string());
        }
        if !block.has_body() {
            f.modifiers.push("declaration".to_string());
        }

        if let Some(doc) = doc_comment_before(&cx.text.lines, decl_start) {
            doc.apply(&mut f);
        }
        Some((f, block.end))
    }
}

impl LanguageExtractor for CppExtractor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        let text = SourceText::new(content, false);
        let mut out = Extraction {
            imports: self.includes(path, &text),
            ..Default::default()
        };
        let cx = Ctx { path, text: &text };
        self.scan_scope(&cx, 0..text.len(), &Scope::root(), &mut out);
        out
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        let text = SourceText::new(content, false);
        let mut deps: Vec<String> = Vec::new();
        for (i, raw) in text.lines.iter().enumerate() {
            if !text.code[i].trim_start().starts_with('#') {
                continue;
            }
            if let Some(caps) = INCLUDE.captures(raw.trim()) {
                if &caps[1] == "\"" && !deps.iter().any(|d| d == &caps[2]) {
                    deps.push(caps[2].to_string());
                }
            }
        }
        deps
    }
}

/// Drop a leading `template<...>` clause. Returns "" when the clause does
/// not close on this line or nothing follows it.
fn strip_template(line: &str) -> &str {
    let rest = match line.strip_prefix("template") {
        Some(rest) if rest.trim_start().starts_with('<') => rest.trim_start(),
        _ => return line,
    };
    let mut depth = 0usize;
    for (idx, c) in rest.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return rest[idx + 1..].trim_start();
                }
            }
            _ => {}
        }
    }
    ""
}

/// Split at the first lone `:` (not part of `::`).
fn split_single_colon(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        let prev = i > 0 && bytes[i - 1] == b':';
        let next = bytes.get(i + 1) == Some(&b':');
        if !prev && !next {
            return (&text[..i], Some(&text[i + 1..]));
        }
    }
    (text, None)
}

fn strip_access(base: &str) -> String {
    base.split_whitespace()
        .filter(|w| !matches!(*w, "public" | "protected" | "private" | "virtual"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parameters from a C/C++ parameter list. Unnamed parameters keep their
/// type with an empty name.
fn cpp_params(raw: &str) -> Vec<Parameter> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "void" {
        return Vec::new();
    }
    split_params(raw)
        .iter()
        .map(|p| {
            let p = strip_default(p);
            if p == "..." {
                return Parameter::new("...", None);
            }
            let p = match p.find('[') {
                Some(idx) => p[..idx].trim_end(),
                None => p,
            };
            let split = p
                .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                .map(|idx| idx + 1)
                .unwrap_or(0);
            let (ty, name) = (p[..split].trim(), &p[split..]);
            if ty.is_empty() || ty.ends_with("::") || ty.ends_with('<') || name.is_empty() {
                Parameter::new("", Some(p.to_string()))
            } else {
                Parameter::new(name, Some(ty.to_string()))
            }
        })
        .collect()
}

/// Names opened by a namespace header, including further namespaces
/// opened on the same line (`namespace a { namespace b {`).
fn namespace_names(line: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = line;
    while let Some(caps) = NAMESPACE.captures(rest) {
        names.push(caps.get(1).map_or("(anonymous)", |m| m.as_str()));
        match rest.find('{') {
            Some(pos) => rest = rest[pos + 1..].trim(),
            None => break,
        }
    }
    names
}

/// A `using X = ...;` or `typedef ... X;` alias at line `i`.
fn type_alias(cx: &Ctx, i: usize, line: &str, scope: &Scope) -> Option<Class> {
    let name = if let Some(caps) = USING_ALIAS.captures(line) {
        caps[1].to_string()
    } else if TYPE_HEAD.is_match(line) {
        return None;
    } else {
        TYPEDEF.captures(line)?[1].to_string()
    };
    let mut alias = Class::new(&name, TypeKind::TypeAlias, SourceLocation::line(cx.path, i + 1));
    alias.scope = scope.qualifier();
    Some(alias)
}

/// A single-line variable declaration. The flag is set for `static` members.
fn variable(cx: &Ctx, i: usize, line: &str, scope: VariableScope) -> Option<(Variable, bool)> {
    if !line.ends_with(';') {
        return None;
    }
    let caps = VARIABLE.captures(line)?;
    let ty = caps["type"].trim();
    let mut words = ty.split_whitespace();
    let first = words.next().unwrap_or("");
    if NOT_A_NAME.contains(&first) || (TYPE_KEYWORDS.contains(&first) && words.next().is_none()) {
        return None;
    }
    let name = &caps["name"];
    if NOT_A_NAME.contains(&name) {
        return None;
    }

    let prefix = &caps["prefix"];
    let mut type_hint = String::new();
    if prefix.split_whitespace().any(|w| w == "const" || w == "constexpr") {
        type_hint.push_str("const ");
    }
    type_hint.push_str(ty);
    // Pointer and reference markers sit between the type and the name.
    let between = &line[caps.name("type").map(|m| m.end()).unwrap_or(0)
        ..caps.name("name").map(|m| m.start()).unwrap_or(0)];
    type_hint.extend(between.chars().filter(|c| matches!(c, '*' | '&')));

    let mut var = Variable::new(name, scope, SourceLocation::line(cx.path, i + 1));
    var.type_hint = Some(type_hint);
    let value = caps.name("value").or_else(|| caps.name("init"));
    if let Some(value) = value {
        let raw = cx.text.raw_fragment(i, line, value.range());
        let raw = raw.trim();
        if !raw.is_empty() {
            var.value = Some(raw.to_string());
        }
    }
    let is_static = prefix.split_whitespace().any(|w| w == "static");
    Some((var, is_static))
}

/// Enumerators between the braces on lines `open..=end`.
fn enumerators(cx: &Ctx, open: usize, end: usize, class: &mut Class) {
    for j in open..=end {
        let line = &cx.text.code[j];
        let from = if j == open { line.find('{').map(|p| p + 1).unwrap_or(0) } else { 0 };
        let to = if j == end { line.rfind('}').unwrap_or(line.len()) } else { line.len() };
        if from >= to {
            continue;
        }
        for entry in line[from..to].split(',') {
            if let Some(caps) = ENUMERATOR.captures(entry.trim()) {
                let mut var = Variable::new(
                    &caps[1],
                    VariableScope::Class,
                    SourceLocation::line(cx.path, j + 1),
                );
                var.value = caps.get(2).map(|v| v.as_str().trim().to_string());
                merge_variable(&mut class.class_variables, var);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpp(source: &str) -> Extraction {
        CppExtractor.extract("src/engine.cpp", source)
    }

    #[test]
    fn test_includes_and_dependencies() {
        let source = "#include <vector>\n#include \"engine.h\"\n// #include \"old.h\"\n#include \"util/log.h\"\n";
        let out = cpp(source);
        let modules: Vec<_> = out.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["vector", "engine.h", "util/log.h"]);
        assert_eq!(CppExtractor.dependencies(source), vec!["engine.h", "util/log.h"]);
    }

    #[test]
    fn test_namespaces_and_free_functions() {
        let source = r#"
namespace app {
namespace detail {
/**
 * @brief Adds two values.
 * @param a left
 */
int add(int a, int b = 1) {
    if (a > b) { return a; }
    return a + b;
}
}

static const int LIMIT = 10;
void shutdown();
}

namespace {
void helper(const std::string& name, int) {}
}
"#;
        let out = cpp(source);
        let add = out.functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.qualified_name(), "app::detail::add");
        assert_eq!(add.location.start_line, 8);
        assert_eq!(add.location.end_line, 11);
        assert_eq!(add.returns.as_deref(), Some("int"));
        assert_eq!(add.params[1].name, "b");
        assert_eq!(add.params[1].type_hint.as_deref(), Some("int"));
        assert_eq!(add.docstring.as_deref(), Some("Adds two values."));

        let shutdown = out.functions.iter().find(|f| f.name == "shutdown").unwrap();
        assert!(shutdown.has_modifier("declaration"));
        assert_eq!(shutdown.scope.as_deref(), Some("app"));

        let helper = out.functions.iter().find(|f| f.name == "helper").unwrap();
        assert_eq!(helper.scope.as_deref(), Some("(anonymous)"));
        assert_eq!(helper.params.len(), 2);
        assert_eq!(helper.params[0].name, "name");
        assert_eq!(helper.params[1].name, "");

        let limit = out.variables.iter().find(|v| v.name == "LIMIT").unwrap();
        assert_eq!(limit.value.as_deref(), Some("10"));
        assert_eq!(limit.type_hint.as_deref(), Some("const int"));
    }

    #[test]
    fn test_class_with_access_sections() {
        let source = r#"
class Logger : public Sink, private Noncopyable {
public:
    static Logger* instance();
    virtual void write(const char* msg) override;
    int level() const { return level_; }
    ~Logger();

private:
    Logger();
    int level_ = 0;
    static Logger* instance_;
};
"#;
        let out = cpp(source);
        let logger = &out.classes[0];
        assert_eq!(logger.kind, TypeKind::Class);
        assert_eq!(logger.bases, vec!["Sink", "Noncopyable"]);
        assert_eq!(logger.location.end_line, 13);

        let names: Vec<_> = logger.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["instance", "write", "level", "~Logger", "Logger"]);
        assert!(logger.method("write").unwrap().has_modifier("override"));
        assert!(logger.method("level").unwrap().has_modifier("const"));
        assert!(logger.method("Logger").unwrap().has_modifier("private"));
        assert!(logger.method("instance").unwrap().has_modifier("public"));
        assert_eq!(logger.method("level").unwrap().qualified_name(), "Logger::level");

        assert!(logger.instance_variables.iter().any(|v| v.name == "level_"));
        assert!(logger.class_variables.iter().any(|v| v.name == "instance_"));
    }

    #[test]
    fn test_out_of_line_definitions() {
        let source = r#"
namespace app {
Logger::Logger() : level_(0) {
}

void Logger::write(const char* msg) {
    puts(msg);
}
}
"#;
        let out = cpp(source);
        let ctor = out.functions.iter().find(|f| f.name == "Logger").unwrap();
        assert_eq!(ctor.qualified_name(), "app::Logger::Logger");
        assert_eq!(ctor.location.end_line, 4);
        let write = out.functions.iter().find(|f| f.name == "write").unwrap();
        assert_eq!(write.scope.as_deref(), Some("app::Logger"));
        assert_eq!(write.location.start_line, 6);
        assert_eq!(write.location.end_line, 8);
    }

    #[test]
    fn test_namespaces_opened_on_one_line() {
        let source = r#"
namespace outer { namespace inner {
class Engine {
public:
    int run();
};
} }

int outer::inner::Engine::run() {
    return 0;
}
"#;
        let out = cpp(source);
        let engine = out.classes.iter().find(|c| c.name == "Engine").unwrap();
        assert_eq!(engine.qualified_name(), "outer::inner::Engine");
        assert_eq!(engine.method("run").unwrap().scope.as_deref(), Some("outer::inner::Engine"));
        let run = out.functions.iter().find(|f| f.name == "run").unwrap();
        assert_eq!(run.scope.as_deref(), Some("outer::inner::Engine"));
    }

    #[test]
    fn test_brace_init_list_in_constructor() {
        let source = r#"
class Engine {
public:
    Engine() : v_{1}, w_{2} {
        start();
    }
    int v_;
    int w_;
};
"#;
        let out = cpp(source);
        let engine = &out.classes[0];
        let ctor = engine.method("Engine").unwrap();
        assert_eq!(ctor.location.start_line, 4);
        assert_eq!(ctor.location.end_line, 6);
        assert_eq!(engine.location.end_line, 9);
        assert!(engine.instance_variables.iter().any(|v| v.name == "w_"));
    }

    #[test]
    fn test_structs_enums_and_templates() {
        let source = r#"
typedef struct {
    int x;
    int y;
} Point;

enum class Color : unsigned char { Red, Green = 2, Blue };

template <typename T>
class Box {
    T value;
public:
    T get() const { return value; }
};

template <typename T> T max_of(T a, T b) { return a > b ? a : b; }

using Handle = int;
"#;
        let out = cpp(source);
        let point = out.classes.iter().find(|c| c.name == "Point").unwrap();
        assert_eq!(point.kind, TypeKind::Struct);
        assert_eq!(point.instance_variables.len(), 2);

        let color = out.classes.iter().find(|c| c.name == "Color").unwrap();
        assert_eq!(color.kind, TypeKind::Enum);
        let values: Vec<_> = color.class_variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(values, vec!["Red", "Green", "Blue"]);

        let boxed = out.classes.iter().find(|c| c.name == "Box").unwrap();
        assert_eq!(boxed.location.start_line, 9);
        assert!(boxed.method("get").unwrap().has_modifier("public"));
        assert!(boxed.instance_variables.iter().any(|v| v.name == "value"));

        let max_of = out.functions.iter().find(|f| f.name == "max_of").unwrap();
        assert_eq!(max_of.params.len(), 2);

        let handle = out.classes.iter().find(|c| c.name == "Handle").unwrap();
        assert_eq!(handle.kind, TypeKind::TypeAlias);
    }

    #[test]
    fn test_statements_are_not_declarations() {
        let source = "int main(int argc, char** argv) {\n    return run(argc);\n}\nREGISTER_PLUGIN(Foo);\n";
        let out = cpp(source);
        assert_eq!(out.functions.len(), 1);
        assert_eq!(out.functions[0].name, "main");
        assert_eq!(out.functions[0].params[1].type_hint.as_deref(), Some("char**"));
        assert!(out.variables.is_empty());
    }
}
