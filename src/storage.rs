//! Local storage boundary.
//!
//! The core consumes documents as `{path, rawText}` pairs and emits writes of
//! the same shape; everything else about the host document store is its own
//! concern. [`FsArticleStore`] is the native filesystem implementation used
//! by the CLI-style hosts and by tests.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

use crate::error::ParleyError;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Markdown files under the configured root, in a stable order.
    async fn list(&self) -> Result<Vec<PathBuf>, ParleyError>;
    async fn read(&self, path: &Path) -> Result<String, ParleyError>;
    async fn write(&self, path: &Path, text: &str) -> Result<(), ParleyError>;
    /// Fails with [`ParleyError::Io`] when the path already exists, so a
    /// retried download run never clobbers an article it created earlier.
    async fn create(&self, path: &Path, text: &str) -> Result<(), ParleyError>;
}

pub struct FsArticleStore {
    root: PathBuf,
}

impl FsArticleStore {
    /// Fails with [`ParleyError::PreconditionFailed`] when the root does not
    /// exist; a missing root would make every direction a silent no-op.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ParleyError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ParleyError::PreconditionFailed(format!(
                "articles root {:?} is not a directory",
                root
            )));
        }
        Ok(FsArticleStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArticleStore for FsArticleStore {
    async fn list(&self) -> Result<Vec<PathBuf>, ParleyError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| ParleyError::Io(format!("walk failed: {e}")))?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "md")
            {
                paths.push(entry.into_path());
            }
        }
        tracing::debug!("Found {} articles under {:?}", paths.len(), self.root);
        Ok(paths)
    }

    async fn read(&self, path: &Path) -> Result<String, ParleyError> {
        Ok(fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, text: &str) -> Result<(), ParleyError> {
        Ok(fs::write(path, text).await?)
    }

    async fn create(&self, path: &Path, text: &str) -> Result<(), ParleyError> {
        if fs::try_exists(path).await? {
            return Err(ParleyError::Io(format!(
                "refusing to overwrite existing article {:?}",
                path
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::write(path, text).await?)
    }
}

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static regex"));

/// Derives a filesystem-safe `.md` file name from a record title.
///
/// Titles are NFC-normalized, stripped of characters that are reserved on
/// common filesystems, and whitespace-collapsed. An empty result falls back
/// to the record slug, which callers must pass explicitly.
pub fn sanitized_file_name(title: &str, fallback: &str) -> String {
    let normalized: String = title.nfc().collect();
    let stripped = UNSAFE_FILENAME_CHARS.replace_all(&normalized, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem = collapsed.trim_matches('.').trim();
    if stem.is_empty() {
        format!("{fallback}.md")
    } else {
        format!("{stem}.md")
    }
}
