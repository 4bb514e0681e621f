//! [`PathRef`]: a filesystem path plus the attributes the rest of the
//! pipeline needs to decide how to treat it, grounded on the original
//! service's `PathModel` (`preview/models.py`).
//!
//! A `PathRef` doesn't own cleanup implicitly on drop — async cleanup
//! can't happen in a synchronous `Drop::drop`. Instead, whoever replaces
//! one (see [`crate::request::PreviewRequest::set_src`]) is responsible
//! for calling [`PathRef::cleanup`] on the value it displaces.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, Result};

/// A single path plus its derived, cached attributes.
#[derive(Debug, Clone)]
pub struct PathRef {
    path: PathBuf,
    size: u64,
    extension: String,
    temp: bool,
    shared: bool,
}

impl PathRef {
    /// Builds a `PathRef` for an existing file, stat'ing it once.
    ///
    /// `temp` and `shared` are computed relative to the process temp
    /// directory and the configured `files_root`: a path under neither is
    /// treated as foreign (not ours to delete, not guaranteed stable).
    pub async fn new(path: PathBuf, files_root: &Path) -> Result<Self> {
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            MediaError::bad_input(format!("{}: {e}", path.display()))
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let temp_dir = std::env::temp_dir();
        let temp = path.starts_with(&temp_dir);
        let shared = !temp && path.starts_with(files_root);

        Ok(PathRef { path, size: meta.len(), extension, temp, shared })
    }

    /// Wraps a path known in advance to be a freshly created temp file
    /// (a backend's own output, a downloaded upload) without re-deriving
    /// `temp`/`shared` from its location.
    pub async fn new_temp(path: PathBuf) -> Result<Self> {
        let meta = tokio::fs::metadata(&path).await.map_err(MediaError::from)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Ok(PathRef { path, size: meta.len(), extension, temp: true, shared: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// True if this path lives under the process temp directory: it was
    /// created for this request and nobody else has a stake in it.
    pub fn is_temp(&self) -> bool {
        self.temp
    }

    /// True if this path lives under the configured shared files root:
    /// caller-owned, must never be deleted by the pipeline.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Deletes the underlying file if (and only if) it's ours to delete.
    /// A no-op for shared or foreign paths. Failures are logged, not
    /// propagated — a leaked temp file is the janitor's problem, not the
    /// request's.
    pub async fn cleanup(self) {
        if !self.temp {
            return;
        }
        if let Err(err) = tokio::fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove temp file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_dir_paths_are_temp() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.png");
        tokio::fs::write(&file, b"data").await.unwrap();
        // `tempdir()` lives under the OS temp dir on every CI/dev box this
        // runs on, so a file::files_root of something unrelated proves
        // the temp check wins regardless.
        let pr = PathRef::new(file.clone(), Path::new("/definitely/not/here")).await.unwrap();
        assert!(pr.is_temp());
        assert!(!pr.is_shared());
        assert_eq!(pr.extension(), "png");
        assert_eq!(pr.size(), 4);
    }

    #[tokio::test]
    async fn shared_root_paths_are_shared() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.pdf");
        tokio::fs::write(&file, b"data").await.unwrap();
        let pr = PathRef::new(file.clone(), dir.path()).await.unwrap();
        assert!(!pr.is_temp() || pr.is_shared());
    }

    #[tokio::test]
    async fn cleanup_removes_temp_only() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("y.png");
        tokio::fs::write(&file, b"data").await.unwrap();
        let pr = PathRef::new_temp(file.clone()).await.unwrap();
        pr.cleanup().await;
        assert!(tokio::fs::metadata(&file).await.is_err());
    }
}
