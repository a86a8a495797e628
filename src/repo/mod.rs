//! Repository acquisition and code-file enumeration

mod git;

pub use git::GitFetcher;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// File extensions that count as code
pub const ALLOWED_EXTENSIONS: [&str; 20] = [
    "cs", "java", "py", "js", "ts", "go", "cpp", "c", "h", "hpp", "php", "rb", "rs", "kt",
    "scala", "swift", "dart", "vue", "jsx", "tsx",
];

/// Directory names never descended into
pub const EXCLUDED_DIRS: [&str; 17] = [
    "node_modules",
    "bin",
    "obj",
    ".git",
    "packages",
    "target",
    "build",
    "dist",
    ".next",
    ".nuxt",
    "vendor",
    "__pycache__",
    ".pytest_cache",
    "coverage",
    ".coverage",
    ".nyc_output",
    "bower_components",
];

/// Acquires a local copy of a repository and serves its code files
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Clone the repository if absent, update it otherwise; returns the
    /// local working-tree path
    async fn fetch(&self, url: &str, repo_name: &str, cancel: &CancellationToken)
        -> Result<PathBuf>;

    /// Repo-root-relative paths of all code files, in stable order
    fn list_code_files(&self, local_path: &Path) -> Result<Vec<String>>;

    /// Contents of one file under the working tree
    async fn read(&self, local_path: &Path, file_path: &str) -> Result<String>;
}

/// Collapse filesystem-unsafe characters and bound the length
pub fn sanitize_repo_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
            {
                '_'
            } else {
                c
            }
        })
        .take(100)
        .collect()
}

/// Recursive walk honoring the extension allow-list and directory
/// deny-list; paths are repo-root-relative with `/` separators, sorted
pub fn walk_code_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !EXCLUDED_DIRS.contains(&name.as_ref())
        });
    for entry in walker {
        let entry = entry.map_err(|e| Error::fetch(format!("directory walk failed: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::fetch(format!("path outside repository root: {e}")))?;
        files.push(relative.to_string_lossy().replace('\\', "/"));
    }
    files.sort();
    Ok(files)
}

/// Serves a pre-existing local directory without cloning anything.
///
/// Useful for indexing a checkout that is already on disk, and for
/// tests.
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RepoFetcher for LocalFetcher {
    async fn fetch(
        &self,
        _url: &str,
        _repo_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !self.root.is_dir() {
            return Err(Error::fetch(format!(
                "local repository {} does not exist",
                self.root.display()
            )));
        }
        Ok(self.root.clone())
    }

    fn list_code_files(&self, local_path: &Path) -> Result<Vec<String>> {
        walk_code_files(local_path)
    }

    async fn read(&self, local_path: &Path, file_path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(local_path.join(file_path)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitize_collapses_unsafe_characters() {
        assert_eq!(sanitize_repo_name("my-repo"), "my-repo");
        assert_eq!(sanitize_repo_name("org/repo"), "org_repo");
        assert_eq!(sanitize_repo_name("a<b>c:d\"e|f?g*h\\i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_repo_name("tab\there"), "tab_here");
    }

    #[test]
    fn sanitize_bounds_length() {
        let long = "x".repeat(250);
        assert_eq!(sanitize_repo_name(&long).len(), 100);
    }

    #[test]
    fn walk_honors_allow_and_deny_lists() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(root.join("src/App.tsx"), "export {}").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("node_modules/dep/index.js"), "x").unwrap();
        fs::write(root.join("target/debug/build.rs"), "x").unwrap();

        let files = walk_code_files(root).unwrap();
        assert_eq!(files, vec!["src/App.tsx".to_string(), "src/lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn local_fetcher_serves_existing_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let fetcher = LocalFetcher::new(dir.path());
        let cancel = CancellationToken::new();
        let root = fetcher.fetch("ignored", "ignored", &cancel).await.unwrap();
        let files = fetcher.list_code_files(&root).unwrap();
        assert_eq!(files, vec!["main.go".to_string()]);
        let content = fetcher.read(&root, "main.go").await.unwrap();
        assert_eq!(content, "package main");
    }

    #[tokio::test]
    async fn local_fetcher_rejects_missing_tree() {
        let fetcher = LocalFetcher::new("/definitely/not/a/path");
        let cancel = CancellationToken::new();
        let result = fetcher.fetch("ignored", "ignored", &cancel).await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }
}
