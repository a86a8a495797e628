//! Git-backed repository fetcher
//!
//! Clones into `<storage>/<sanitized name>`. An existing clone is
//! updated by fetching the remote and hard-resetting the working tree to
//! the fetched head, so updates never create merge commits.

use super::{sanitize_repo_name, walk_code_files, RepoFetcher};
use crate::error::{Error, Result};
use async_trait::async_trait;
use git2::{Repository, ResetType};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub struct GitFetcher {
    storage_path: PathBuf,
}

impl GitFetcher {
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    /// Where a repository's working tree lives
    pub fn local_path(&self, repo_name: &str) -> PathBuf {
        self.storage_path.join(sanitize_repo_name(repo_name))
    }

    fn fetch_blocking(url: &str, dir: &Path) -> Result<()> {
        if dir.join(".git").exists() {
            tracing::debug!(path = %dir.display(), "updating existing clone");
            let repo = Repository::open(dir)?;
            {
                let mut remote = repo.find_remote("origin")?;
                remote.fetch(&[] as &[&str], None, None)?;
            }
            let fetch_head = repo.find_reference("FETCH_HEAD")?;
            let target = fetch_head
                .target()
                .ok_or_else(|| Error::fetch("fetched head has no target commit"))?;
            let object = repo.find_object(target, None)?;
            repo.reset(&object, ResetType::Hard, None)?;
        } else {
            tracing::debug!(url, path = %dir.display(), "cloning repository");
            if let Some(parent) = dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Repository::clone(url, dir)?;
        }
        Ok(())
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(
        &self,
        url: &str,
        repo_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let dir = self.local_path(repo_name);
        let url = url.to_string();
        let target = dir.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&url, &target)).await??;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(dir)
    }

    fn list_code_files(&self, local_path: &Path) -> Result<Vec<String>> {
        walk_code_files(local_path)
    }

    async fn read(&self, local_path: &Path, file_path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(local_path.join(file_path)).await?)
    }
}
