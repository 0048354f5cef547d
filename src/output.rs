// src/output.rs
// =============================================================================
// This module owns the output directory (the "output root") of a mirror run.
//
// Lifecycle:
// 1. prepare(): whatever is at the path is destroyed and an empty directory
//    is created in its place. Failing here is fatal for the run.
// 2. make_room(): called before every download so the destination can be
//    written even if an earlier download left a plain file where a directory
//    is now needed. That file is deleted (lossy, logged at warn level).
//
// Rust concepts:
// - tokio::fs: Async versions of the std::fs functions
// - io::ErrorKind: Lets us treat "not found" as a normal outcome
// =============================================================================

use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use crate::mapper;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRoot {
    path: PathBuf,
}

impl OutputRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Where a referenced resource is stored
    pub fn local_path(&self, url: &Url) -> PathBuf {
        mapper::local_path(url, &self.path)
    }

    // Where a crawled page is stored (directory-aware)
    pub fn page_path(&self, url: &Url) -> PathBuf {
        mapper::page_path(url, &self.path)
    }

    // Destroys any existing content and recreates the directory empty
    pub async fn prepare(&self) -> Result<()> {
        match tokio::fs::symlink_metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => {
                info!(path = %self.path.display(), "Clearing existing output directory");
                tokio::fs::remove_dir_all(&self.path).await.with_context(|| {
                    format!("Failed to clear output directory {}", self.path.display())
                })?;
            }
            Ok(_) => {
                info!(path = %self.path.display(), "Removing conflicting file");
                tokio::fs::remove_file(&self.path).await.with_context(|| {
                    format!("Failed to remove file at {}", self.path.display())
                })?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to inspect output directory {}", self.path.display())
                });
            }
        }

        tokio::fs::create_dir_all(&self.path).await.with_context(|| {
            format!("Failed to create output directory {}", self.path.display())
        })?;

        Ok(())
    }

    // Makes sure `dest` can be written as a file
    //
    // Walks from the output root down to `dest`. Any non-directory entry found
    // on an intermediate component blocks a directory we need, so it is
    // deleted. An existing file at `dest` itself is deleted too, since the
    // download is about to replace it. Finally the parent directories are
    // created.
    pub async fn make_room(&self, dest: &Path) -> io::Result<()> {
        let Ok(relative) = dest.strip_prefix(&self.path) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside {}", dest.display(), self.path.display()),
            ));
        };

        let components: Vec<_> = relative.components().collect();
        let mut current = self.path.clone();

        for (index, component) in components.iter().enumerate() {
            current.push(component);
            let is_leaf = index + 1 == components.len();

            match tokio::fs::symlink_metadata(&current).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    if is_leaf {
                        warn!(path = %current.display(), "Deleting existing file at download target");
                    } else {
                        warn!(
                            path = %current.display(),
                            needed_for = %dest.display(),
                            "Deleting file that collides with a needed directory"
                        );
                    }
                    tokio::fs::remove_file(&current).await?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e),
            }
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(())
    }
}
