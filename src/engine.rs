//! Analysis engine: per-file stages in parallel, then the project-wide
//! barriers.
//!
//! 1. Every file is decoded, extracted, and given behavior and quality
//!    analysis on a bounded rayon pool. A failure or panic in one file
//!    only skips that file.
//! 2. Barrier: dependency resolution over the complete file map.
//! 3. Barrier: the call graph over every file's call sites.
//! 4. Totals, language counts and entry points.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use rayon::prelude::*;

use crate::behavior::BehaviorAnalyzer;
use crate::config::Config;
use crate::discover::SourceFile;
use crate::error::AnalysisError;
use crate::extract::scan::code_view;
use crate::extract::{Extractor, LanguageExtractor, PythonExtractor};
use crate::language::Language;
use crate::model::{FileRecord, ProjectAnalysis, SkippedFile};
use crate::quality::{CallGraph, CallSites, QualityAnalyzer, Syntax};
use crate::resolve::DependencyResolver;

/// File names that mark an entry point.
pub const ENTRY_POINTS: &[&str] = &[
    "main.py",
    "app.py",
    "run.py",
    "manage.py",
    "__main__.py",
    "index.js",
    "main.js",
    "app.js",
    "server.js",
    "index.ts",
    "main.ts",
    "app.ts",
    "main.cpp",
    "main.c",
    "Program.cs",
    "App.svelte",
];

/// Output of the per-file stage.
struct Analyzed {
    record: FileRecord,
    sites: CallSites,
}

/// Runs a complete analysis over a set of discovered files.
pub struct Engine {
    config: Config,
    behavior: BehaviorAnalyzer,
    quality: QualityAnalyzer,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let behavior = BehaviorAnalyzer::new(config.impure_calls.iter().cloned());
        let quality = QualityAnalyzer::new(config.smells);
        Self {
            config,
            behavior,
            quality,
        }
    }

    /// Analyze `files`, which were discovered under `root`.
    pub fn analyze(&self, root: &Path, files: Vec<SourceFile>) -> ProjectAnalysis {
        let jobs = self.config.jobs();
        tracing::info!("analyzing {} files with {} workers", files.len(), jobs);

        let outcomes: Vec<(String, Result<Analyzed, AnalysisError>)> =
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| self.run_files(&files)),
                Err(e) => {
                    tracing::warn!("cannot build worker pool ({}); using the global pool", e);
                    self.run_files(&files)
                }
            };

        let mut records = BTreeMap::new();
        let mut sites = BTreeMap::new();
        let mut skipped = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(analyzed) => {
                    sites.insert(path.clone(), analyzed.sites);
                    records.insert(path, analyzed.record);
                }
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path, e);
                    skipped.push(SkippedFile {
                        path,
                        reason: skip_reason(e),
                    });
                }
            }
        }
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("resolving dependencies across {} files", records.len());
        let dependency_graph = DependencyResolver::new(&records).resolve(&mut records);

        tracing::info!("building call graph");
        let call_graph = CallGraph::build(&records, &sites);
        for (path, record) in records.iter_mut() {
            if let Some(file_sites) = sites.get(path) {
                call_graph.apply(record, file_sites);
            }
        }

        let mut languages = BTreeMap::new();
        for record in records.values() {
            *languages.entry(record.language.clone()).or_insert(0) += 1;
        }
        let entry_points: Vec<String> = records
            .keys()
            .filter(|path| {
                let name = path.rsplit('/').next().unwrap_or(path.as_str());
                ENTRY_POINTS.contains(&name)
            })
            .cloned()
            .collect();

        ProjectAnalysis {
            root: root.display().to_string(),
            name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string()),
            total_files: records.len(),
            total_size: records.values().map(|r| r.size_bytes).sum(),
            total_lines: records.values().map(|r| r.line_count).sum(),
            files: records,
            dependency_graph,
            languages,
            entry_points,
            skipped,
        }
    }

    fn run_files(&self, files: &[SourceFile]) -> Vec<(String, Result<Analyzed, AnalysisError>)> {
        files
            .par_iter()
            .map(|file| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyze_file(file)))
                    .unwrap_or_else(|payload| {
                        Err(AnalysisError::Panicked {
                            path: file.path.clone(),
                            message: panic_message(payload.as_ref()),
                        })
                    });
                (file.path.clone(), outcome)
            })
            .collect()
    }

    /// The per-file stage: decode, extract, behavior, quality.
    fn analyze_file(&self, file: &SourceFile) -> Result<Analyzed, AnalysisError> {
        let content = decode(file)?;
        tracing::debug!("analyzing {}", file.path);

        let language = Language::from_path(&file.path);
        let mut record = FileRecord::new(&file.path, language.as_str());
        record.size_bytes = file.size;
        record.modified = file.modified;
        record.line_count = content.lines().count();
        let lines: Vec<String> = content.lines().map(String::from).collect();

        let Some(extractor) = Extractor::for_language(language) else {
            return Ok(Analyzed {
                record,
                sites: CallSites::default(),
            });
        };

        let sites = match extractor {
            Extractor::Python(ref python) => {
                self.analyze_python(python, &mut record, content, &lines)
            }
            ref scanner => {
                let out = scanner.extract(&file.path, content);
                record.functions = out.functions;
                record.classes = out.classes;
                record.variables = out.variables;
                record.imports = out.imports;
                record.raw_dependencies = scanner.dependencies(content);

                let template_strings = matches!(
                    language,
                    Language::JavaScript | Language::TypeScript | Language::Svelte
                );
                let code = code_view(&lines, template_strings);
                self.quality
                    .analyze_file(&mut record, &Syntax::Code(&code), &lines)
            }
        };

        Ok(Analyzed { record, sites })
    }

    fn analyze_python(
        &self,
        python: &PythonExtractor,
        record: &mut FileRecord,
        content: &str,
        lines: &[String],
    ) -> CallSites {
        let parsed = match python.parse(&record.path, content) {
            Ok(parsed) if !parsed.has_errors() => parsed,
            Ok(_) => {
                tracing::warn!("{}: syntax errors, no symbols extracted", record.path);
                return CallSites::default();
            }
            Err(e) => {
                tracing::warn!("{}: {}", record.path, e);
                return CallSites::default();
            }
        };

        let out = python.extract_parsed(&parsed);
        record.functions = out.functions;
        record.classes = out.classes;
        record.variables = out.variables;
        record.imports = out.imports;
        record.raw_dependencies = python.dependencies(content);

        for function in record.all_functions_mut() {
            if let Some(node) = parsed.function_at(&function.location) {
                let (behavior, flow) = self.behavior.analyze(&parsed, node);
                function.behavior = Some(behavior);
                function.variable_flow = flow;
            }
        }

        self.quality
            .analyze_file(record, &Syntax::Tree(&parsed), lines)
    }
}

/// Decode file content as text. NUL bytes or invalid UTF-8 make a file
/// unreadable.
fn decode(file: &SourceFile) -> Result<&str, AnalysisError> {
    let unreadable = |reason: &str| AnalysisError::Unreadable {
        path: file.path.clone(),
        reason: reason.to_string(),
    };
    if let Some(ref reason) = file.read_error {
        return Err(unreadable(reason));
    }
    if file.bytes.contains(&0) {
        return Err(unreadable("binary content"));
    }
    std::str::from_utf8(&file.bytes).map_err(|_| unreadable("invalid UTF-8"))
}

fn skip_reason(err: AnalysisError) -> String {
    match err {
        AnalysisError::Unreadable { reason, .. } => reason,
        AnalysisError::Panicked { message, .. } => format!("panic: {}", message),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(Config {
            jobs: Some(2),
            ..Default::default()
        })
    }

    #[test]
    fn test_binary_file_is_skipped() {
        let files = vec![
            SourceFile::new("logo.py", vec![0x89, b'P', b'N', b'G', 0, 0, 1]),
            SourceFile::new("latin.py", vec![b'x', b' ', b'=', b' ', 0xe9]),
            SourceFile::new("ok.py", "def f():\n    return 1\n"),
        ];
        let analysis = engine().analyze(Path::new("proj"), files);
        assert_eq!(analysis.total_files, 1);
        assert!(analysis.file("logo.py").is_none());
        let skipped: Vec<_> = analysis
            .skipped
            .iter()
            .map(|s| (s.path.as_str(), s.reason.as_str()))
            .collect();
        assert_eq!(
            skipped,
            vec![("latin.py", "invalid UTF-8"), ("logo.py", "binary content")]
        );
        assert_eq!(analysis.file("ok.py").unwrap().functions.len(), 1);
    }

    #[test]
    fn test_unknown_and_malformed_files_keep_a_record() {
        let files = vec![
            SourceFile::new("notes.txt", "def nope(:\n"),
            SourceFile::new("broken.py", "def broken(:\n    pass\n"),
        ];
        let analysis = engine().analyze(Path::new("proj"), files);
        let notes = analysis.file("notes.txt").unwrap();
        assert_eq!(notes.language, "unknown");
        assert!(notes.functions.is_empty());
        let broken = analysis.file("broken.py").unwrap();
        assert!(broken.functions.is_empty());
        assert_eq!(broken.line_count, 2);
        assert_eq!(analysis.languages["unknown"], 1);
        assert_eq!(analysis.languages["python"], 1);
    }

    #[test]
    fn test_python_functions_get_behavior_and_complexity() {
        let files = vec![SourceFile::new(
            "main.py",
            "import os\n\ndef greet(name):\n    if name:\n        print(name)\n    return name\n",
        )];
        let analysis = engine().analyze(Path::new("/work/demo"), files);
        assert_eq!(analysis.name, "demo");
        assert_eq!(analysis.entry_points, vec!["main.py"]);

        let greet = analysis.find_function("greet")[0];
        assert_eq!(greet.complexity, Some(2));
        let behavior = greet.behavior.as_ref().unwrap();
        assert!(!behavior.pure);
        assert_eq!(behavior.side_effects, vec!["Calls print"]);
        assert!(greet.variable_flow.contains_key("name"));
    }

    #[test]
    fn test_scanned_functions_have_no_behavior() {
        let files = vec![SourceFile::new(
            "src/index.js",
            "export function start(a) {\n  if (a) { run(); }\n}\nfunction run() {}\n",
        )];
        let analysis = engine().analyze(Path::new("proj"), files);
        let start = analysis.find_function("start")[0];
        assert!(start.behavior.is_none());
        assert_eq!(start.complexity, Some(2));
        assert_eq!(start.calls, vec!["run"]);
        let run = analysis.find_function("run")[0];
        assert_eq!(run.called_by, vec!["src/index.js"]);
        assert_eq!(analysis.entry_points, vec!["src/index.js"]);
    }
}
