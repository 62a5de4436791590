//! Codeatlas - multi-language source tree analyzer.
//!
//! Codeatlas builds a structural and behavioral model of a project: the
//! functions, types, variables and imports of every file, the internal
//! dependency graph, and per-function behavior and quality metrics.
//!
//! # Architecture
//!
//! - `discover`: walks the project and reads candidate files
//! - `extract`: per-language symbol extractors (tree-sitter for Python,
//!   line and brace scanning for the rest)
//! - `resolve`: import resolution into a `petgraph` dependency graph
//! - `behavior`: control flow, purity and variable flow for Python functions
//! - `quality`: complexity, call graph, design patterns and code smells
//! - `engine`: runs the per-file stages in parallel, then the project barriers
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! Add a variant to `Language`, implement `LanguageExtractor` in
//! `src/extract/`, and register it in `Extractor::for_language`.

pub mod behavior;
pub mod cli;
pub mod config;
pub mod discover;
pub mod engine;
pub mod error;
pub mod extract;
pub mod language;
pub mod model;
pub mod quality;
pub mod report;
pub mod resolve;

pub use behavior::BehaviorAnalyzer;
pub use config::{Config, SmellThresholds};
pub use discover::{discover, SourceFile};
pub use engine::Engine;
pub use error::{AnalysisError, Result};
pub use extract::{Extraction, Extractor, LanguageExtractor};
pub use language::Language;
pub use model::{FileRecord, Function, ProjectAnalysis};
pub use quality::QualityAnalyzer;
pub use resolve::{DependencyGraph, DependencyResolver};

/// Discover and analyze the project at `root` in one call.
pub fn analyze_path(root: &std::path::Path, config: Config) -> Result<ProjectAnalysis> {
    let files = discover(root, &config)?;
    Ok(Engine::new(config).analyze(root, files))
}
