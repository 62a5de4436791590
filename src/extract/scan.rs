//! Shared building blocks for the line-oriented scanners.
//!
//! The scanners work on two parallel views of a file: the raw lines, and a
//! "code" view of the same lines where comments and string/character
//! literal contents are blanked with spaces. Column positions are kept, so
//! a match found in the code view can be read back from the raw line.
//! Brace counting runs on the code view, so a `{` inside a string or a
//! comment never opens a block.

use std::collections::BTreeMap;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Function, Parameter};

/// Maximum number of lines a declaration header may span before its body.
pub const MAX_HEADER_LINES: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    Template,
}

/// Raw and code views of one file.
pub struct SourceText {
    pub lines: Vec<String>,
    pub code: Vec<String>,
}

impl SourceText {
    /// Build both views. `template_strings` enables backtick literals
    /// that may span lines.
    pub fn new(content: &str, template_strings: bool) -> Self {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let code = code_view(&lines, template_strings);
        Self { lines, code }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Raw text for `range` of `fragment`, where `fragment` is a trailing
    /// slice of code line `idx` with trailing whitespace removed.
    ///
    /// Falls back to the code view when byte columns cannot be mapped back
    /// to the raw line.
    pub fn raw_fragment(&self, idx: usize, fragment: &str, range: Range<usize>) -> String {
        let code = self.code[idx].trim_end();
        let base = code.len().saturating_sub(fragment.len());
        let (start, end) = (base + range.start, base + range.end);
        let raw = &self.lines[idx];
        let mapped = raw.len() >= end
            && raw.is_char_boundary(start)
            && raw.is_char_boundary(end)
            && raw[..start].is_ascii();
        if mapped {
            raw[start..end].to_string()
        } else {
            code.get(start..end).unwrap_or("").to_string()
        }
    }
}

/// Blank comments and literal contents, keeping delimiters and columns.
pub fn code_view(lines: &[String], template_strings: bool) -> Vec<String> {
    let mut state = LexState::Code;
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        let mut buf = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match state {
                LexState::BlockComment => {
                    if c == '*' && next == Some('/') {
                        buf.push_str("  ");
                        i += 2;
                        state = LexState::Code;
                        continue;
                    }
                    buf.push(' ');
                }
                LexState::Template => {
                    if c == '\\' {
                        buf.push_str("  ");
                        i += 2;
                        continue;
                    }
                    if c == '`' {
                        buf.push('`');
                        state = LexState::Code;
                    } else {
                        buf.push(' ');
                    }
                }
                LexState::Code => {
                    if c == '/' && next == Some('/') {
                        break;
                    }
                    if c == '/' && next == Some('*') {
                        buf.push_str("  ");
                        i += 2;
                        state = LexState::BlockComment;
                        continue;
                    }
                    if c == '"' || c == '\'' {
                        // Quoted literals end at the closing quote or end of line.
                        buf.push(c);
                        i += 1;
                        while i < chars.len() {
                            let d = chars[i];
                            if d == '\\' {
                                buf.push_str("  ");
                                i += 2;
                                continue;
                            }
                            if d == c {
                                buf.push(c);
                                break;
                            }
                            buf.push(' ');
                            i += 1;
                        }
                        i += 1;
                        continue;
                    }
                    if c == '`' && template_strings {
                        buf.push('`');
                        state = LexState::Template;
                    } else {
                        buf.push(c);
                    }
                }
            }
            i += 1;
        }
        out.push(buf);
    }

    out
}

/// A brace-delimited region found by [`find_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Line of the declaration header.
    pub start: usize,
    /// Line holding the opening brace, if the declaration has a body.
    pub open: Option<usize>,
    /// Line holding the matching closing brace (or the header end).
    pub end: usize,
}

impl Block {
    pub fn has_body(&self) -> bool {
        self.open.is_some()
    }

    /// Lines strictly inside the braces.
    pub fn inner(&self) -> Range<usize> {
        match self.open {
            Some(open) => (open + 1)..self.end.max(open + 1),
            None => self.end..self.end,
        }
    }
}

/// Find the extent of the declaration starting at line `start` by counting
/// braces in the code view.
///
/// Depth is the net brace count summed per line; the block ends on the
/// first line after which the running count is back to zero. A header
/// line with a net count of zero is a one-line block.
///
/// A `;` before any `{` ends a bodiless declaration. A `}` before any `{`
/// belongs to the enclosing block and ends the header on the previous line.
/// Unbalanced input ends at the last line. The header search is bounded by
/// [`MAX_HEADER_LINES`], and the returned `end` is never before `start`.
pub fn find_block(code: &[String], start: usize) -> Block {
    if start >= code.len() {
        return Block {
            start,
            open: None,
            end: start,
        };
    }

    let mut depth = 0i64;
    let mut open = None;

    for (i, line) in code.iter().enumerate().skip(start) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    if open.is_none() {
                        open = Some(i);
                    }
                }
                '}' => {
                    if open.is_none() {
                        let end = if i > start { i - 1 } else { start };
                        return Block {
                            start,
                            open: None,
                            end,
                        };
                    }
                    depth -= 1;
                }
                ';' if open.is_none() => {
                    return Block {
                        start,
                        open: None,
                        end: i,
                    };
                }
                _ => {}
            }
        }
        if open.is_some() && depth <= 0 {
            return Block { start, open, end: i };
        }
        if open.is_none() && i + 1 - start >= MAX_HEADER_LINES {
            return Block {
                start,
                open: None,
                end: start,
            };
        }
    }

    let end = match open {
        Some(_) => code.len() - 1,
        None => start,
    };
    Block { start, open, end }
}

/// Last line of a statement that has no braced body of its own.
///
/// Continues while brackets are open or the line ends in an operator that
/// needs a continuation (`=`, `=>`, `|`, `,` ...). Bounded by end of input.
pub fn statement_end(code: &[String], start: usize) -> usize {
    let mut depth = 0i64;
    for (i, line) in code.iter().enumerate().skip(start) {
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            }
        }
        let t = line.trim_end();
        let continues = t.ends_with("=>")
            || t.ends_with(|c: char| matches!(c, '=' | '|' | '&' | ',' | '?' | ':' | '+' | '.'));
        if depth < 0 || (depth == 0 && !continues) {
            return i;
        }
    }
    code.len().saturating_sub(1).max(start)
}

/// Join lines from `start` until the first parenthesis group closes.
///
/// Returns the joined text (the whole closing line included) and the index
/// of the closing line.
pub fn gather_parens(code: &[String], start: usize) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut seen = false;

    for (i, line) in code.iter().enumerate().skip(start).take(MAX_HEADER_LINES) {
        if i > start {
            text.push(' ');
        }
        text.push_str(line.trim());
        for c in line.chars() {
            match c {
                '(' => {
                    depth += 1;
                    seen = true;
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    if seen && depth == 0 {
                        return Some((text, i));
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Contents of the first balanced parenthesis group in `text`.
pub fn paren_contents(text: &str) -> Option<(String, usize)> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    for (idx, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + idx;
                    return Some((text[open + 1..close].to_string(), close));
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offset just past the first whole-word occurrence of `word`.
pub fn word_end(text: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '#';
    let mut from = 0;
    while let Some(pos) = text[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_ident(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_ident(c));
        if before_ok && after_ok {
            return Some(end);
        }
        from = end;
    }
    None
}

/// Split a parameter list on top-level commas.
pub fn split_params(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut prev = ' ';

    for c in text.chars() {
        match c {
            '(' | '<' | '[' | '{' => depth += 1,
            '>' if prev == '=' => {}
            ')' | '>' | ']' | '}' => depth -= 1,
            ',' if depth <= 0 => {
                let part = current.trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                current.clear();
                prev = c;
                continue;
            }
            _ => {}
        }
        current.push(c);
        prev = c;
    }

    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    parts
}

/// Strip a `= default` suffix at nesting depth zero.
pub fn strip_default(param: &str) -> &str {
    let mut depth = 0i32;
    let bytes = param.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'<' | b'[' | b'{' => depth += 1,
            b')' | b'>' | b']' | b'}' => depth -= 1,
            b'=' if depth <= 0 => {
                let next = bytes.get(i + 1).copied();
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if next != Some(b'=') && next != Some(b'>') && !matches!(prev, b'!' | b'<' | b'>' | b'=') {
                    return param[..i].trim();
                }
            }
            _ => {}
        }
    }
    param.trim()
}

/// Leading words of `text` that belong to `allowed`, and the remainder.
pub fn take_modifiers<'a>(text: &'a str, allowed: &[&str]) -> (Vec<String>, &'a str) {
    let mut rest = text.trim_start();
    let mut modifiers = Vec::new();
    loop {
        let word_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..word_end];
        if word.is_empty() || !allowed.contains(&word) {
            break;
        }
        modifiers.push(word.to_string());
        rest = rest[word_end..].trim_start();
    }
    (modifiers, rest)
}

/// Immutable namespace/class context threaded through a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// A new scope one level deeper.
    pub fn push(&self, name: &str) -> Scope {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Scope { segments }
    }

    /// `::`-joined qualifier, `None` at the root.
    pub fn qualifier(&self) -> Option<String> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.segments.join("::"))
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

lazy_static! {
    static ref PARAM_TAG: Regex = Regex::new(
        r"^[@\\]param(?:\[[a-z,\s]*\])?\s+(?:\{([^}]*)\}\s*)?\[?([A-Za-z_$][\w$.]*)[^\s]*\]?\s*-?\s*(.*)$"
    )
    .unwrap();
    static ref RETURN_TAG: Regex =
        Regex::new(r"^[@\\]returns?\s*(?:\{([^}]*)\}\s*)?-?\s*(.*)$").unwrap();
    static ref BRIEF_TAG: Regex = Regex::new(r"^[@\\]brief\s+(.*)$").unwrap();
    static ref XML_SUMMARY: Regex = Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap();
    static ref XML_PARAM: Regex =
        Regex::new(r#"(?s)<param\s+name="([^"]+)"\s*>(.*?)</param>"#).unwrap();
    static ref XML_RETURNS: Regex = Regex::new(r"(?s)<returns>(.*?)</returns>").unwrap();
    static ref XML_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// A documented parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocParam {
    pub type_hint: Option<String>,
    pub description: String,
}

/// A parsed structured comment (JSDoc, Doxygen or XML documentation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocComment {
    pub description: String,
    pub params: BTreeMap<String, DocParam>,
    pub returns_type: Option<String>,
    pub returns: Option<String>,
}

impl DocComment {
    /// Parse the cleaned lines of a comment block.
    pub fn parse(lines: &[String]) -> Self {
        let joined = lines.join("\n");
        if XML_SUMMARY.is_match(&joined) || XML_PARAM.is_match(&joined) {
            return Self::parse_xml(&joined);
        }

        let mut doc = DocComment::default();
        let mut description = Vec::new();
        for line in lines {
            let line = line.trim();
            if let Some(caps) = PARAM_TAG.captures(line) {
                doc.params.insert(
                    caps[2].to_string(),
                    DocParam {
                        type_hint: caps.get(1).map(|m| m.as_str().trim().to_string()),
                        description: caps[3].trim().to_string(),
                    },
                );
            } else if let Some(caps) = RETURN_TAG.captures(line) {
                doc.returns_type = caps.get(1).map(|m| m.as_str().trim().to_string());
                let text = caps[2].trim();
                if !text.is_empty() {
                    doc.returns = Some(text.to_string());
                }
            } else if let Some(caps) = BRIEF_TAG.captures(line) {
                description.push(caps[1].trim().to_string());
            } else if !line.starts_with('@') && !line.is_empty() {
                description.push(line.to_string());
            }
        }
        doc.description = description.join(" ");
        doc
    }

    fn parse_xml(text: &str) -> Self {
        let clean = |s: &str| {
            let stripped = XML_TAG.replace_all(s, "");
            stripped.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        let mut doc = DocComment::default();
        if let Some(caps) = XML_SUMMARY.captures(text) {
            doc.description = clean(&caps[1]);
        }
        for caps in XML_PARAM.captures_iter(text) {
            doc.params.insert(
                caps[1].to_string(),
                DocParam {
                    type_hint: None,
                    description: clean(&caps[2]),
                },
            );
        }
        if let Some(caps) = XML_RETURNS.captures(text) {
            doc.returns = Some(clean(&caps[1]));
        }
        doc
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.params.is_empty() && self.returns.is_none()
    }

    /// Attach documentation and fill in types the signature left out.
    pub fn apply(&self, function: &mut Function) {
        if function.docstring.is_none() && !self.description.is_empty() {
            function.docstring = Some(self.description.clone());
        }
        for param in &mut function.params {
            if param.type_hint.is_none() {
                if let Some(documented) = self.params.get(&param.name) {
                    param.type_hint = documented.type_hint.clone();
                }
            }
        }
        if function.returns.is_none() {
            function.returns = self.returns_type.clone();
        }
    }
}

/// Collect the structured comment that ends right above line `idx`.
///
/// Attribute (`[...]`) and decorator (`@...`) lines between the comment and
/// the declaration are skipped. Only `/** */`, `/*! */` and `///` blocks
/// count as documentation.
pub fn doc_comment_before(lines: &[String], idx: usize) -> Option<DocComment> {
    let mut end = idx;
    while end > 0 {
        let line = lines[end - 1].trim();
        if (line.starts_with('[') && line.ends_with(']')) || line.starts_with('@') {
            end -= 1;
        } else {
            break;
        }
    }
    if end == 0 {
        return None;
    }

    let last = lines[end - 1].trim();
    let mut body = Vec::new();

    if last.starts_with("///") {
        let mut i = end;
        while i > 0 && lines[i - 1].trim().starts_with("///") {
            i -= 1;
        }
        for line in &lines[i..end] {
            body.push(line.trim().trim_start_matches('/').trim().to_string());
        }
    } else if last.ends_with("*/") {
        let mut i = end;
        loop {
            if i == 0 {
                return None;
            }
            i -= 1;
            if lines[i].contains("/*") {
                break;
            }
        }
        let first = lines[i].trim();
        if !(first.starts_with("/**") || first.starts_with("/*!")) {
            return None;
        }
        for line in &lines[i..end] {
            let cleaned = line
                .trim()
                .trim_start_matches("/**")
                .trim_start_matches("/*!")
                .trim_end_matches("*/")
                .trim()
                .trim_start_matches('*')
                .trim();
            body.push(cleaned.to_string());
        }
    } else {
        return None;
    }

    let doc = DocComment::parse(&body);
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

/// Build parameters from `name: Type` style entries.
pub fn colon_params(raw: &str) -> Vec<Parameter> {
    split_params(raw)
        .iter()
        .filter_map(|p| {
            let p = strip_default(p);
            let p = p.trim_start_matches("...");
            let (name, type_hint) = match p.split_once(':') {
                Some((n, t)) => (n.trim(), Some(t.trim().to_string())),
                None => (p.trim(), None),
            };
            // TS parameter properties carry modifiers before the name.
            let name = name
                .split_whitespace()
                .last()
                .unwrap_or_default()
                .trim_end_matches('?');
            // Destructured parameters keep their pattern text as the name.
            if name.is_empty() {
                None
            } else {
                Some(Parameter::new(name, type_hint))
            }
        })
        .collect()
}

/// Blank the given byte ranges, keeping newlines.
pub fn blank_ranges(content: &str, ranges: &[Range<usize>]) -> String {
    let mut out: Vec<u8> = content.as_bytes().to_vec();
    for range in ranges {
        for b in &mut out[range.clone()] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// 1-indexed line number of a byte offset.
pub fn line_of_offset(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())].matches('\n').count() + 1
}
