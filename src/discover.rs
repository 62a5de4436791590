//! File discovery.
//!
//! Walks the project root and reads every file that survives the ignore
//! rules. Files of unknown language are kept so they show up in the
//! structural listing; the engine decides what to extract.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{AnalysisError, Result};

/// Directory names never descended into.
const IGNORED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "venv",
    "env",
    ".env",
    ".venv",
    "build",
    "dist",
];

/// Compiled and binary artifact extensions.
const IGNORED_EXTENSIONS: &[&str] = &["pyc", "pyo", "pyd", "so", "dll", "dylib", "class", "o", "obj"];

/// One discovered file with its raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative, `/`-separated.
    pub path: String,
    pub bytes: Vec<u8>,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub modified: Option<u64>,
    /// Set when the file could not be read.
    pub read_error: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            path: path.into(),
            size: bytes.len() as u64,
            bytes,
            modified: None,
            read_error: None,
        }
    }

    fn unreadable(path: String, reason: String) -> Self {
        Self {
            path,
            bytes: Vec::new(),
            size: 0,
            modified: None,
            read_error: Some(reason),
        }
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    IGNORED_DIRS.contains(&name.as_ref()) || name.starts_with('.')
}

fn is_ignored_file(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => IGNORED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Root-relative path with `/` separators.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        parts.join("/")
    }
}

/// Walk `root` and read every file that is not ignored, sorted by path.
pub fn discover(root: &Path, config: &Config) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        return Err(AnalysisError::RootNotFound(root.to_path_buf()));
    }
    let excluded = config.exclusions()?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !is_ignored_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_ignored_file(&name) {
            continue;
        }
        let path = relative_path(root, entry.path());
        if excluded.is_match(&path) {
            tracing::debug!("excluded {}", path);
            continue;
        }

        match fs::read(entry.path()) {
            Ok(bytes) => {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs());
                let mut file = SourceFile::new(path, bytes);
                file.modified = modified;
                files.push(file);
            }
            Err(e) => {
                tracing::warn!("cannot read {}: {}", path, e);
                files.push(SourceFile::unreadable(path, e.to_string()));
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!("discovered {} files under {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_ignore_rules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "main.py", "print('hi')\n");
        write(root, "pkg/util.py", "");
        write(root, "pkg/__pycache__/util.cpython-311.pyc", "");
        write(root, "node_modules/lib/index.js", "");
        write(root, ".git/config", "");
        write(root, "venv/lib/site.py", "");
        write(root, "dist/bundle.js", "");
        write(root, ".env", "SECRET=1");
        write(root, ".DS_Store", "");
        write(root, "native/module.so", "");
        write(root, "README.md", "# hi\n");

        let files = discover(root, &Config::default()).unwrap();
        assert_eq!(paths(&files), vec!["README.md", "main.py", "pkg/util.py"]);

        let main = &files[1];
        assert_eq!(main.size, 12);
        assert!(main.modified.is_some());
        assert!(main.read_error.is_none());
    }

    #[test]
    fn test_excluded_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.ts", "");
        write(dir.path(), "src/generated/api.ts", "");
        let config = Config {
            excluded_paths: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        let files = discover(dir.path(), &config).unwrap();
        assert_eq!(paths(&files), vec!["src/app.ts"]);
    }

    #[test]
    fn test_missing_root() {
        let err = discover(Path::new("/definitely/not/here"), &Config::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::RootNotFound(_)));
    }
}
