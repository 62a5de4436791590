//! C# line scanner.
//!
//! Handles `using` directives, block and file-scoped namespaces, type
//! declarations (class, struct, interface, enum, record), attributes,
//! methods, constructors, properties and fields. XML doc comments attach
//! to the declaration that follows them.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::scan::{
    doc_comment_before, find_block, gather_parens, paren_contents, split_params, strip_default,
    take_modifiers, word_end, Scope, SourceText,
};
use crate::extract::{Extraction, LanguageExtractor};
use crate::language::Language;
use crate::model::{
    merge_variable, Class, Function, Import, Parameter, SourceLocation, TypeKind, Variable,
    VariableScope,
};

const TYPE_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "abstract", "sealed", "partial",
    "readonly", "unsafe", "new", "file", "ref",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "virtual", "override", "abstract",
    "sealed", "async", "extern", "unsafe", "new", "partial", "readonly", "const", "volatile",
    "event", "required", "implicit", "explicit",
];

const NOT_A_NAME: &[&str] = &[
    "if", "for", "foreach", "while", "switch", "using", "lock", "catch", "return", "new", "throw",
    "await", "typeof", "nameof", "sizeof", "default", "checked", "unchecked", "fixed", "else",
    "case", "do", "var", "yield", "goto", "delegate", "operator", "this", "base",
];

/// Parameter prefixes that are not part of the type.
const PARAM_MODIFIERS: &[&str] = &["this", "ref", "out", "in", "params", "scoped", "readonly"];

lazy_static! {
    static ref USING: Regex = Regex::new(
        r"^(global\s+)?using\s+(static\s+)?(?:([A-Za-z_]\w*)\s*=\s*)?([A-Za-z_][\w.]*(?:<[^;]*>)?)\s*;"
    )
    .unwrap();
    static ref NAMESPACE: Regex = Regex::new(r"^namespace\s+([A-Za-z_][\w.]*)\s*(;)?").unwrap();
    static ref TYPE_DECL: Regex = Regex::new(
        r"^(class|struct|interface|enum|record(?:\s+(?:class|struct))?)\s+([A-Za-z_]\w*)"
    )
    .unwrap();
    static ref ATTRIBUTE: Regex = Regex::new(r"^\[(.*)\]$").unwrap();
    static ref METHOD: Regex = Regex::new(
        r"^(?P<ret>(?:[\w.<>\[\],?]+\s+)*?)(?P<name>(?:[A-Za-z_]\w*\.)*~?[A-Za-z_]\w*)\s*(?:<[^()]*>)?\s*\("
    )
    .unwrap();
    static ref PROPERTY: Regex = Regex::new(
        r"^(?P<type>(?:[\w.<>\[\],?]+\s+)+?)(?P<name>[A-Za-z_]\w*)\s*(?:\{|=>)"
    )
    .unwrap();
    static ref PROPERTY_INIT: Regex = Regex::new(r"\}\s*=\s*(.+?)\s*;\s*$").unwrap();
    static ref FIELD: Regex = Regex::new(
        r"^(?P<type>(?:[\w.<>\[\],?]+\s+)+?)(?P<name>[A-Za-z_]\w*)\s*(?:=\s*(?P<value>.+?))?\s*;$"
    )
    .unwrap();
    static ref ENUMERATOR: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*(?:=\s*(.+))?$").unwrap();
}

/// Scanner for `.cs` files.
pub struct CSharpExtractor;

struct Ctx<'a> {
    path: &'a str,
    text: &'a SourceText,
}

impl CSharpExtractor {
    fn usings(&self, path: &str, text: &SourceText) -> Vec<Import> {
        let mut imports = Vec::new();
        for (i, code) in text.code.iter().enumerate() {
            let caps = match USING.captures(code.trim()) {
                Some(caps) => caps,
                None => continue,
            };
            let mut import = Import::new(&caps[4], SourceLocation::line(path, i + 1));
            import.alias = caps.get(3).map(|m| m.as_str().to_string());
            if caps.get(2).is_some() {
                // `using static` brings the type's members into scope.
                import.names.push("*".to_string());
                import.is_qualified_import = true;
            }
            imports.push(import);
        }
        imports
    }

    fn scan_scope(&self, cx: &Ctx, range: Range<usize>, scope: &Scope, out: &mut Extraction) {
        let code = &cx.text.code;
        let mut attributes: Vec<String> = Vec::new();
        let mut i = range.start;

        while i < range.end {
            let t = code[i].trim();
            if t.is_empty() || t.starts_with('#') {
                i += 1;
                continue;
            }
            if let Some(attrs) = attribute_line(cx, i) {
                attributes.extend(attrs);
                i += 1;
                continue;
            }

            if let Some(caps) = NAMESPACE.captures(t) {
                let inner = scope.push(&caps[1]);
                if caps.get(2).is_some() {
                    // File-scoped: the rest of the range belongs to it.
                    self.scan_scope(cx, (i + 1)..range.end, &inner, out);
                    return;
                }
                let block = find_block(code, i);
                self.scan_scope(cx, block.inner(), &inner, out);
                i = block.end + 1;
                attributes.clear();
                continue;
            }

            if let Some(end) = self.type_decl(cx, i, scope, &mut attributes, out) {
                i = end + 1;
                continue;
            }

            attributes.clear();
            if t.contains('{') {
                i = find_block(code, i).end + 1;
                continue;
            }
            i += 1;
        }
    }

    /// A type declaration at line `i`. Returns the last line consumed.
    fn type_decl(
        &self,
        cx: &Ctx,
        i: usize,
        scope: &Scope,
        attributes: &mut Vec<String>,
        out: &mut Extraction,
    ) -> Option<usize> {
        let code = &cx.text.code;
        let (modifiers, rest) = take_modifiers(code[i].trim(), TYPE_MODIFIERS);
        let caps = TYPE_DECL.captures(rest)?;
        let keyword = caps[1].split_whitespace().next().unwrap_or("class");
        let name = caps[2].to_string();
        let kind = TypeKind::from_keyword(keyword)?;

        let block = find_block(code, i);
        let header_end = block.open.unwrap_or(block.end);
        let header: String = code[i..=header_end]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let header = header.split('{').next().unwrap_or("");
        let after_name = &header[word_end(header, &name).unwrap_or(header.len())..];
        let after_name = skip_generics(after_name);

        let mut class = Class::new(
            &name,
            kind,
            SourceLocation::new(cx.path, i + 1, block.end + 1),
        );
        class.scope = scope.qualifier();
        class.modifiers = modifiers;
        class.decorators = std::mem::take(attributes);
        if let Some(doc) = doc_comment_before(&cx.text.lines, i) {
            class.docstring = Some(doc.description);
        }

        // Primary constructor parameters become properties.
        let mut tail = after_name;
        if after_name.trim_start().starts_with('(') {
            if let Some((params, close)) = paren_contents(after_name) {
                for param in cs_params(&params) {
                    let mut var = Variable::new(
                        &param.name,
                        VariableScope::Class,
                        SourceLocation::line(cx.path, i + 1),
                    );
                    var.type_hint = param.type_hint;
                    merge_variable(&mut class.instance_variables, var);
                }
                tail = &after_name[close + 1..];
            }
        }
        if let Some(bases) = tail.trim_start().strip_prefix(':') {
            let bases = bases.split(" where ").next().unwrap_or(bases);
            class.bases = split_params(bases)
                .into_iter()
                .map(|b| b.split('(').next().unwrap_or(&b).trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
        }

        if let Some(open) = block.open {
            if kind == TypeKind::Enum {
                enumerators(cx, open, block.end, &mut class);
            } else {
                let inner = scope.push(&name);
                self.scan_class(cx, block.inner(), &inner, &mut class, out);
            }
        }
        out.classes.push(class);
        Some(block.end)
    }

    fn scan_class(
        &self,
        cx: &Ctx,
        range: Range<usize>,
        scope: &Scope,
        class: &mut Class,
        out: &mut Extraction,
    ) {
        let code = &cx.text.code;
        let mut attributes: Vec<String> = Vec::new();
        let mut i = range.start;
        let last = range.end.saturating_sub(1);

        while i < range.end {
            let t = code[i].trim();
            if t.is_empty() || t.starts_with('#') {
                i += 1;
                continue;
            }
            if let Some(attrs) = attribute_line(cx, i) {
                attributes.extend(attrs);
                i += 1;
                continue;
            }
            if let Some(end) = self.type_decl(cx, i, scope, &mut attributes, out) {
                i = end + 1;
                continue;
            }

            let (modifiers, rest) = take_modifiers(t, MEMBER_MODIFIERS);

            if let Some(mut method) = self.method(cx, i, rest, scope, &class.name) {
                let end = method.location.end_line.saturating_sub(1).min(last).max(i);
                method.location.end_line = end + 1;
                method.is_async = modifiers.iter().any(|m| m == "async");
                let markers = std::mem::replace(&mut method.modifiers, modifiers);
                method.modifiers.extend(markers);
                method.decorators = std::mem::take(&mut attributes);
                class.methods.push(method);
                i = end + 1;
                continue;
            }

            if let Some(caps) = PROPERTY.captures(rest) {
                let ty = caps["type"].trim();
                if !NOT_A_NAME.contains(&ty) {
                    let end = find_block(code, i).end.min(last).max(i);
                    let mut var = Variable::new(
                        &caps["name"],
                        VariableScope::Class,
                        SourceLocation::new(cx.path, i + 1, end + 1),
                    );
                    var.type_hint = Some(ty.to_string());
                    if let Some(init) = PROPERTY_INIT.captures(code[end].trim_end()) {
                        if let Some(value) = init.get(1) {
                            let raw = cx.text.raw_fragment(end, code[end].trim_end(), value.range());
                            var.value = Some(raw.trim().to_string());
                        }
                    }
                    add_member(class, var, &modifiers);
                    attributes.clear();
                    i = end + 1;
                    continue;
                }
            }

            if let Some(caps) = FIELD.captures(rest) {
                let ty = caps["type"].trim();
                if !NOT_A_NAME.contains(&ty.split_whitespace().next().unwrap_or("")) {
                    let mut var = Variable::new(
                        &caps["name"],
                        VariableScope::Class,
                        SourceLocation::line(cx.path, i + 1),
                    );
                    var.type_hint = Some(ty.to_string());
                    if let Some(value) = caps.name("value") {
                        let raw = cx.text.raw_fragment(i, rest, value.range());
                        var.value = Some(raw.trim().to_string());
                    }
                    add_member(class, var, &modifiers);
                    attributes.clear();
                    i += 1;
                    continue;
                }
            }

            attributes.clear();
            if t.contains('{') {
                i = find_block(code, i).end.min(last).max(i) + 1;
                continue;
            }
            i += 1;
        }
    }

    /// A method or constructor whose signature starts at line `i`.
    /// `rest` is the line with its modifiers removed.
    fn method(
        &self,
        cx: &Ctx,
        i: usize,
        rest: &str,
        scope: &Scope,
        class_name: &str,
    ) -> Option<Function> {
        let caps = METHOD.captures(rest)?;
        let ret = caps["ret"].trim();
        let full_name = &caps["name"];
        let bare = full_name.rsplit('.').next().unwrap_or(full_name);

        let first = ret.split_whitespace().next().unwrap_or("");
        if NOT_A_NAME.contains(&first) || NOT_A_NAME.contains(&bare) {
            return None;
        }
        let is_ctor = bare == class_name || bare == format!("~{}", class_name);
        if ret.is_empty() && !is_ctor {
            return None;
        }

        let code = &cx.text.code;
        let (header, _) = gather_parens(code, i)?;
        let from = word_end(&header, full_name)?;
        let (params, close) = paren_contents(&header[from..])?;
        let after = header[from + close + 1..].trim_start();

        let block = find_block(code, i);
        let mut f = Function::new(bare, SourceLocation::new(cx.path, i + 1, block.end + 1));
        f.scope = scope.qualifier();
        f.params = cs_params(&params);
        if !ret.is_empty() {
            f.returns = Some(ret.to_string());
        }
        if !block.has_body() && !after.contains("=>") {
            f.modifiers.push("declaration".to_string());
        }
        if let Some(doc) = doc_comment_before(&cx.text.lines, i) {
            doc.apply(&mut f);
        }
        Some(f)
    }
}

impl LanguageExtractor for CSharpExtractor {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        let text = SourceText::new(content, false);
        let mut out = Extraction {
            imports: self.usings(path, &text),
            ..Default::default()
        };
        let cx = Ctx { path, text: &text };
        self.scan_scope(&cx, 0..text.len(), &Scope::root(), &mut out);
        out
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        let text = SourceText::new(content, false);
        let mut deps: Vec<String> = Vec::new();
        for import in self.usings("", &text) {
            if import.alias.is_none() && !import.is_qualified_import && !deps.contains(&import.module) {
                deps.push(import.module);
            }
        }
        deps
    }
}

/// Attribute names from a `[...]` line, `None` if line `i` is not one.
fn attribute_line(cx: &Ctx, i: usize) -> Option<Vec<String>> {
    let t = cx.text.code[i].trim();
    ATTRIBUTE.captures(t)?;
    let raw = cx.text.lines[i].trim();
    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    let inner = inner
        .split_once(':')
        .filter(|(target, _)| {
            matches!(
                target.trim(),
                "assembly" | "module" | "return" | "method" | "field" | "property" | "type"
            )
        })
        .map_or(inner, |(_, rest)| rest);
    Some(
        split_params(inner)
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
    )
}

/// Skip a `<...>` type parameter list.
fn skip_generics(text: &str) -> &str {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('<') {
        return text;
    }
    let mut depth = 0usize;
    for (idx, c) in trimmed.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &trimmed[idx + 1..];
                }
            }
            _ => {}
        }
    }
    ""
}

fn cs_params(raw: &str) -> Vec<Parameter> {
    split_params(raw)
        .iter()
        .filter_map(|p| {
            let mut p = strip_default(p);
            // Parameter attributes.
            while let Some(attr) = p.strip_prefix('[') {
                p = match attr.find(']') {
                    Some(end) => attr[end + 1..].trim_start(),
                    None => "",
                };
            }
            let (_, p) = take_modifiers(p, PARAM_MODIFIERS);
            let (ty, name) = p.trim().rsplit_once(char::is_whitespace)?;
            Some(Parameter::new(name, Some(ty.trim().to_string())))
        })
        .collect()
}

fn add_member(class: &mut Class, var: Variable, modifiers: &[String]) {
    if modifiers.iter().any(|m| m == "static" || m == "const") {
        merge_variable(&mut class.class_variables, var);
    } else {
        merge_variable(&mut class.instance_variables, var);
    }
}

fn enumerators(cx: &Ctx, open: usize, end: usize, class: &mut Class) {
    for j in open..=end {
        let line = &cx.text.code[j];
        if line.trim_start().starts_with('[') {
            continue;
        }
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

    fn cs(source: &str) -> Extraction {
        CSharpExtractor.extract("src/Services/UserService.cs", source)
    }

    #[test]
    fn test_usings() {
        let source = "using System;\nusing static System.Math;\nusing Json = Newtonsoft.Json;\nglobal using MyApp.Models;\n";
        let out = cs(source);
        assert_eq!(out.imports.len(), 4);
        assert!(out.imports[1].is_qualified_import);
        assert_eq!(out.imports[2].alias.as_deref(), Some("Json"));
        assert_eq!(out.imports[2].module, "Newtonsoft.Json");
        assert_eq!(
            CSharpExtractor.dependencies(source),
            vec!["System", "MyApp.Models"]
        );
    }

    #[test]
    fn test_class_members() {
        let source = r#"
namespace MyApp.Services
{
    /// <summary>
    /// Manages users.
    /// </summary>
    [Service]
    public sealed class UserService : BaseService, IUserService
    {
        private static UserService _instance;
        private readonly Dictionary<string, User> _cache = new();
        public const int MaxUsers = 100;

        public int Count { get; private set; } = 0;
        public bool IsEmpty => Count == 0;

        private UserService(ILogger logger) : base(logger)
        {
        }

        /// <summary>Loads a user.</summary>
        /// <param name="id">User id</param>
        [HttpGet]
        public async Task<User> LoadAsync(
            int id,
            CancellationToken token = default)
        {
            return await _repo.Find(id);
        }

        public override string ToString() => $"Users: {Count}";
    }
}
"#;
        let out = cs(source);
        assert_eq!(out.classes.len(), 1);
        let service = &out.classes[0];
        assert_eq!(service.qualified_name(), "MyApp.Services::UserService");
        assert_eq!(service.bases, vec!["BaseService", "IUserService"]);
        assert_eq!(service.decorators, vec!["Service"]);
        assert_eq!(service.docstring.as_deref(), Some("Manages users."));
        assert_eq!(service.modifiers, vec!["public", "sealed"]);
        assert_eq!(service.location.start_line, 8);
        assert_eq!(service.location.end_line, 32);

        let ctor = service.method("UserService").unwrap();
        assert!(ctor.has_modifier("private"));
        assert_eq!(ctor.params[0].type_hint.as_deref(), Some("ILogger"));

        let load = service.method("LoadAsync").unwrap();
        assert!(load.is_async);
        assert_eq!(load.returns.as_deref(), Some("Task<User>"));
        assert_eq!(load.params.len(), 2);
        assert_eq!(load.params[1].name, "token");
        assert_eq!(load.decorators, vec!["HttpGet"]);
        assert_eq!(load.docstring.as_deref(), Some("Loads a user."));
        assert_eq!(load.location.start_line, 24);
        assert_eq!(load.location.end_line, 29);

        let to_string = service.method("ToString").unwrap();
        assert_eq!(to_string.location.start_line, to_string.location.end_line);
        assert!(!to_string.has_modifier("declaration"));

        let statics: Vec<_> = service.class_variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(statics, vec!["_instance", "MaxUsers"]);
        let cache = service.instance_variables.iter().find(|v| v.name == "_cache").unwrap();
        assert_eq!(cache.type_hint.as_deref(), Some("Dictionary<string, User>"));
        assert_eq!(cache.value.as_deref(), Some("new()"));
        let count = service.instance_variables.iter().find(|v| v.name == "Count").unwrap();
        assert_eq!(count.value.as_deref(), Some("0"));
        assert!(service.instance_variables.iter().any(|v| v.name == "IsEmpty"));
    }

    #[test]
    fn test_file_scoped_namespace_records_and_enums() {
        let source = r#"
namespace MyApp.Models;

public record Person(string Name, int Age);

public enum Role { Admin, User = 2 }

public interface IRepository<T> where T : class
{
    T Find(int id);
}
"#;
        let out = cs(source);
        let person = out.classes.iter().find(|c| c.name == "Person").unwrap();
        assert_eq!(person.kind, TypeKind::Record);
        assert_eq!(person.scope.as_deref(), Some("MyApp.Models"));
        assert_eq!(person.instance_variables.len(), 2);
        assert_eq!(person.instance_variables[1].type_hint.as_deref(), Some("int"));

        let role = out.classes.iter().find(|c| c.name == "Role").unwrap();
        assert_eq!(role.class_variables.len(), 2);

        let repo = out.classes.iter().find(|c| c.name == "IRepository").unwrap();
        assert_eq!(repo.kind, TypeKind::Interface);
        assert!(repo.bases.is_empty());
        let find = repo.method("Find").unwrap();
        assert!(find.has_modifier("declaration"));
        assert_eq!(find.returns.as_deref(), Some("T"));
    }
}
