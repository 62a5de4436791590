//! Analysis configuration.
//!
//! Read from `codeatlas.yaml` (or `.codeatlas.yaml`) in the working
//! directory, or from an explicit `--config` path. Every field has a
//! default, so an empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// File names searched for when no `--config` is given.
pub const CONFIG_FILE_NAMES: &[&str] = &["codeatlas.yaml", ".codeatlas.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Worker threads for the per-file stage. Defaults to available parallelism.
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Call names that make a function impure.
    #[serde(default = "default_impure_calls")]
    pub impure_calls: Vec<String>,
    /// Glob patterns for paths to exclude (e.g. "**/generated/**").
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub smells: SmellThresholds,
}

/// Code-smell thresholds. A measurement strictly above the limit is a smell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SmellThresholds {
    /// Maximum lines per function (default: 50)
    pub max_function_length: usize,
    /// Maximum lines per class (default: 200)
    pub max_class_length: usize,
    /// Maximum parameters, not counting `self`/`this` (default: 5)
    pub max_parameters: usize,
    /// Maximum nesting of conditionals and loops (default: 3)
    pub max_nesting_depth: usize,
}

impl Default for SmellThresholds {
    fn default() -> Self {
        Self {
            max_function_length: 50,
            max_class_length: 200,
            max_parameters: 5,
            max_nesting_depth: 3,
        }
    }
}

fn default_impure_calls() -> Vec<String> {
    ["print", "open", "write", "input"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: None,
            impure_calls: default_impure_calls(),
            excluded_paths: Vec::new(),
            smells: SmellThresholds::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))?;
        if config.jobs == Some(0) {
            return Err(AnalysisError::Config("jobs must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Find a configuration file in `dir`.
    pub fn find_in(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Load `explicit` if given, else the file found in `dir`, else defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => match Self::find_in(dir) {
                Some(path) => {
                    tracing::debug!("using config {}", path.display());
                    Self::parse_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Worker count: the configured value, else available parallelism.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Compile `excluded_paths` into a matcher. Invalid patterns are an error.
    pub fn exclusions(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern)
                .map_err(|e| AnalysisError::Config(format!("excluded path {:?}: {}", pattern, e)))?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AnalysisError::Config(e.to_string()))
    }

    /// The commented default configuration written by `codeatlas init`.
    pub fn template() -> &'static str {
        DEFAULT_TEMPLATE
    }

    /// Write the default template to `path`, refusing to overwrite.
    pub fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(AnalysisError::Config(format!(
                "{} already exists",
                path.display()
            )));
        }
        fs::write(path, DEFAULT_TEMPLATE)?;
        Ok(())
    }
}

const DEFAULT_TEMPLATE: &str = r#"# codeatlas configuration

# Worker threads for per-file analysis (default: available parallelism)
# jobs: 4

# Calls that make a Python function impure
impure_calls:
  - print
  - open
  - write
  - input

# Glob patterns for paths to skip
excluded_paths: []
#  - "**/generated/**"

# Code-smell thresholds
smells:
  max_function_length: 50
  max_class_length: 200
  max_parameters: 5
  max_nesting_depth: 3
"#;
