//! Per-language symbol extraction.
//!
//! Each extractor turns raw file text into flat lists of functions,
//! classes, variables and imports, plus the raw dependency strings the
//! file names. Extraction never fails: malformed input yields an empty or
//! partial result.
//!
//! # Extractors
//!
//! - `python`: tree-sitter backed, full fidelity
//! - `javascript`: line scanner for JavaScript and TypeScript
//! - `cpp`: line scanner for C and C++ sources and headers
//! - `csharp`: line scanner for C#
//! - `svelte`: script block through `javascript`, plus a template pass
//!
//! The scanners share the brace counter and doc-comment parser in `scan`.

pub mod cpp;
pub mod csharp;
pub mod javascript;
pub mod python;
pub mod scan;
pub mod svelte;

use crate::language::Language;
use crate::model::{Class, Function, Import, Variable};

pub use cpp::CppExtractor;
pub use csharp::CSharpExtractor;
pub use javascript::ScriptExtractor;
pub use python::{ParsedFile, PythonExtractor};
pub use svelte::SvelteExtractor;

/// Symbols extracted from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub functions: Vec<Function>,
    pub classes: Vec<Class>,
    pub variables: Vec<Variable>,
    pub imports: Vec<Import>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.variables.is_empty()
            && self.imports.is_empty()
    }

    /// Move every location down by `offset` lines.
    pub fn shift(&mut self, offset: usize) {
        for f in &mut self.functions {
            f.shift(offset);
        }
        for c in &mut self.classes {
            c.shift(offset);
        }
        for v in &mut self.variables {
            v.shift(offset);
        }
        for i in &mut self.imports {
            i.location.shift(offset);
        }
    }

    pub fn extend(&mut self, other: Extraction) {
        self.functions.extend(other.functions);
        self.classes.extend(other.classes);
        self.variables.extend(other.variables);
        self.imports.extend(other.imports);
    }
}

/// Language-specific extraction.
pub trait LanguageExtractor {
    /// The language this extractor handles.
    fn language(&self) -> Language;

    /// Extract symbols from file content.
    fn extract(&self, path: &str, content: &str) -> Extraction;

    /// Raw dependency strings named by the file.
    fn dependencies(&self, content: &str) -> Vec<String>;
}

/// Closed dispatch over the extractor variants, chosen once per file.
pub enum Extractor {
    Python(PythonExtractor),
    Script(ScriptExtractor),
    Cpp(CppExtractor),
    CSharp(CSharpExtractor),
    Svelte(SvelteExtractor),
}

impl Extractor {
    /// Get the extractor for a language. `None` for unknown languages.
    pub fn for_language(language: Language) -> Option<Self> {
        match language {
            Language::Python => Some(Extractor::Python(PythonExtractor::new())),
            Language::JavaScript => Some(Extractor::Script(ScriptExtractor::new(false))),
            Language::TypeScript => Some(Extractor::Script(ScriptExtractor::new(true))),
            Language::Cpp => Some(Extractor::Cpp(CppExtractor)),
            Language::CSharp => Some(Extractor::CSharp(CSharpExtractor)),
            Language::Svelte => Some(Extractor::Svelte(SvelteExtractor)),
            Language::Unknown => None,
        }
    }

    fn inner(&self) -> &dyn LanguageExtractor {
        match self {
            Extractor::Python(e) => e,
            Extractor::Script(e) => e,
            Extractor::Cpp(e) => e,
            Extractor::CSharp(e) => e,
            Extractor::Svelte(e) => e,
        }
    }
}

impl LanguageExtractor for Extractor {
    fn language(&self) -> Language {
        self.inner().language()
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        self.inner().extract(path, content)
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        self.inner().dependencies(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_language() {
        assert!(Extractor::for_language(Language::Unknown).is_none());
        let ts = Extractor::for_language(Language::TypeScript).unwrap();
        assert_eq!(ts.language(), Language::TypeScript);
        let svelte = Extractor::for_language(Language::Svelte).unwrap();
        assert_eq!(svelte.language(), Language::Svelte);
    }

    #[test]
    fn test_extractors_never_fail_on_garbage() {
        let garbage = "}}}{{{ class ( def ::: <script> \u{0}";
        for language in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Cpp,
            Language::CSharp,
            Language::Svelte,
        ] {
            let extractor = Extractor::for_language(language).unwrap();
            let out = extractor.extract("x", garbage);
            for f in &out.functions {
                assert!(f.location.end_line >= f.location.start_line);
            }
            let _ = extractor.dependencies(garbage);
        }
    }
}
