//! Quality metrics: complexity, call graph, design patterns and code smells.
//!
//! Everything except the call graph is computed per file. The call graph
//! needs every file's call sites first, so [`QualityAnalyzer::analyze_file`]
//! returns them for the engine to collect before [`CallGraph::build`].

pub mod callgraph;
pub mod complexity;
pub mod patterns;
pub mod smells;

pub use callgraph::{collect_call_names, CallGraph, CallSites};
pub use complexity::{python_complexity, scanned_complexity};
pub use patterns::detect_patterns;
pub use smells::detect_smells;

use crate::config::SmellThresholds;
use crate::extract::ParsedFile;
use crate::model::FileRecord;

/// What a file offers for structural analysis.
pub enum Syntax<'a> {
    /// A syntax tree.
    Tree(&'a ParsedFile),
    /// The comment- and literal-blanked code view of a scanned file.
    Code(&'a [String]),
    /// Nothing to analyze.
    None,
}

/// Per-file quality analysis.
pub struct QualityAnalyzer {
    limits: SmellThresholds,
}

impl QualityAnalyzer {
    pub fn new(limits: SmellThresholds) -> Self {
        Self { limits }
    }

    /// Fill complexity, patterns and smells on `record` and return its call
    /// sites. `lines` is the raw source split into lines.
    pub fn analyze_file(&self, record: &mut FileRecord, syntax: &Syntax, lines: &[String]) -> CallSites {
        match syntax {
            Syntax::Tree(parsed) => {
                for function in record.all_functions_mut() {
                    let Some(node) = parsed.function_at(&function.location) else {
                        continue;
                    };
                    match python_complexity(parsed, node) {
                        Ok(score) => function.complexity = Some(score),
                        Err(e) => tracing::debug!(
                            "complexity query failed for {}: {}",
                            function.qualified_name(),
                            e
                        ),
                    }
                }
            }
            Syntax::Code(code) => {
                for function in record.all_functions_mut() {
                    function.complexity = Some(scanned_complexity(code, &function.location));
                }
            }
            Syntax::None => return CallSites::default(),
        }

        record.patterns = detect_patterns(record, lines);
        record.smells = detect_smells(record, syntax, &self.limits);

        match syntax {
            Syntax::Tree(parsed) => collect_call_names(Some(parsed), &[]),
            Syntax::Code(code) => {
                let mut sites = collect_call_names(None, code);
                sites.remove_declarations(record);
                sites
            }
            Syntax::None => CallSites::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::scan::code_view;
    use crate::extract::{CSharpExtractor, LanguageExtractor, PythonExtractor};
    use crate::model::{DesignPattern, SmellKind};

    #[test]
    fn test_python_file() {
        let source = r#"class Settings:
    _instance = None

    def load(self, path):
        if path:
            return read(path)
        return None


def read(path):
    return path
"#;
        let extractor = PythonExtractor::new();
        let parsed = extractor.parse("settings.py", source).unwrap();
        let out = extractor.extract_parsed(&parsed);
        let mut record = FileRecord::new("settings.py", "python");
        record.functions = out.functions;
        record.classes = out.classes;

        let lines: Vec<String> = source.lines().map(String::from).collect();
        let sites = QualityAnalyzer::new(SmellThresholds::default()).analyze_file(
            &mut record,
            &Syntax::Tree(&parsed),
            &lines,
        );

        assert_eq!(record.classes[0].methods[0].complexity, Some(2));
        assert_eq!(record.functions[0].complexity, Some(1));
        // `_instance` without a private constructor
        assert!(record.patterns.is_empty());
        assert!(record.smells.is_empty());
        assert!(sites.names().contains("read"));
    }

    #[test]
    fn test_scanned_file() {
        let source = r#"public class NotificationCenter
{
    private List<IObserver> _observers = new();

    public void Notify(string evt, int a, int b, int c, int d, int e)
    {
        foreach (var o in _observers) { if (o != null && evt != null) o.Update(evt); }
    }
}
"#;
        let lines: Vec<String> = source.lines().map(String::from).collect();
        let code = code_view(&lines, false);
        let out = CSharpExtractor.extract("Center.cs", source);
        let mut record = FileRecord::new("Center.cs", "csharp");
        record.classes = out.classes;

        let sites = QualityAnalyzer::new(SmellThresholds::default()).analyze_file(
            &mut record,
            &Syntax::Code(&code),
            &lines,
        );

        let notify = record.classes[0].method("Notify").unwrap();
        assert_eq!(notify.complexity, Some(4));
        assert_eq!(record.patterns, vec![DesignPattern::Observer]);
        assert_eq!(record.smells.len(), 1);
        assert_eq!(record.smells[0].kind, SmellKind::TooManyParameters);
        assert_eq!(record.smells[0].line, 5);
        assert!(sites.names().contains("Update"));
    }

    #[test]
    fn test_no_syntax() {
        let mut record = FileRecord::new("README", "unknown");
        let sites = QualityAnalyzer::new(SmellThresholds::default()).analyze_file(
            &mut record,
            &Syntax::None,
            &[],
        );
        assert!(sites.is_empty());
        assert!(record.patterns.is_empty());
    }
}
