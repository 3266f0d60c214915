//! File scanner for collecting the analyzable file set.
//!
//! Walks a local directory and gathers source files honoring extension,
//! exclude, size, and count limits from the `[scanner]` config section.

use crate::models::SourceFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["rs", "py", "js"]).
    pub extensions: Vec<String>,
    /// Directory or file names to exclude (e.g., ["node_modules", "target"]).
    pub excludes: Vec<String>,
    /// Maximum file size in bytes.
    pub max_file_size: usize,
    /// Maximum number of files to collect.
    pub max_files: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec![
                "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "h", "hpp",
                "cs", "rb", "php", "swift", "kt",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excludes: vec![
                ".git",
                "target",
                "node_modules",
                "vendor",
                "dist",
                "build",
                "__pycache__",
                ".venv",
                "venv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_size: 100 * 1024, // 100KB
            max_files: 50,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            max_files: config.max_files,
        }
    }
}

/// File scanner over a local directory root.
pub struct FileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Collect all matching source files with their contents, sorted by
    /// relative path so downstream cache keys are stable.
    pub fn collect(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            anyhow::bail!("Not a directory: {}", self.root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            match std::fs::read_to_string(entry.path()) {
                Ok(content) => files.push(SourceFile {
                    path: rel_path,
                    content,
                }),
                Err(e) => warn!("Failed to read {}: {}", rel_path, e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.truncate(self.config.max_files);

        debug!("Collected {} file(s) under {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Read one file as the entire analysis set.
    pub fn collect_single(path: &Path) -> Result<Vec<SourceFile>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(vec![SourceFile {
            path: name,
            content,
        }])
    }

    /// Whether a file passes the extension and size filters.
    fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.extensions.iter().any(|e| e == ext) {
            return false;
        }

        match std::fs::metadata(path) {
            Ok(meta) => meta.len() <= self.config.max_file_size as u64,
            Err(_) => false,
        }
    }

    /// Hidden entries and configured excludes are pruned whole. The scan
    /// root itself is never pruned even when it is a dot-directory.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.path() == self.root {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.config.excludes.iter().any(|p| name == *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collects_matching_files_sorted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.py", "print('b')");
        write(tmp.path(), "a.rs", "fn main() {}");
        write(tmp.path(), "notes.txt", "not source");

        let scanner = FileScanner::new(tmp.path().to_path_buf(), ScanConfig::default());
        let files = scanner.collect().unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.rs");
        assert_eq!(files[1].path, "b.py");
        assert_eq!(files[0].content, "fn main() {}");
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/main.rs", "fn main() {}");
        write(tmp.path(), "node_modules/lib.js", "module.exports = {}");
        write(tmp.path(), ".hidden/secret.py", "pass");

        let scanner = FileScanner::new(tmp.path().to_path_buf(), ScanConfig::default());
        let files = scanner.collect().unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("main.rs"));
    }

    #[test]
    fn test_oversized_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "big.rs", &"x".repeat(200));
        write(tmp.path(), "small.rs", "fn f() {}");

        let scanner = FileScanner::new(
            tmp.path().to_path_buf(),
            ScanConfig {
                max_file_size: 100,
                ..ScanConfig::default()
            },
        );
        let files = scanner.collect().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "small.rs");
    }

    #[test]
    fn test_max_files_truncates() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            write(tmp.path(), &format!("f{}.rs", i), "fn f() {}");
        }

        let scanner = FileScanner::new(
            tmp.path().to_path_buf(),
            ScanConfig {
                max_files: 3,
                ..ScanConfig::default()
            },
        );
        assert_eq!(scanner.collect().unwrap().len(), 3);
    }

    #[test]
    fn test_collect_single_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "svc.py", "def f(): pass");

        let files = FileScanner::collect_single(&tmp.path().join("svc.py")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "svc.py");
    }
}
