//! [`FileSource`]: turns a caller-supplied input (a local path or a
//! remote URL) into a [`PathRef`] sitting on local disk, grounded on
//! `preview/__init__.py`'s `handle_post`/`handle_get` and
//! ferrex-server's upload handling. Multipart file uploads are ingested
//! in `pvs-server::http::preview` instead, where axum's `Field` type is
//! already in scope.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{MediaError, Result};
use crate::pathref::PathRef;

/// Maximum number of redirect hops followed when fetching a URL origin.
/// The original service used aiohttp's default of no explicit cap; we
/// pick a small, explicit bound rather than inherit an implicit one.
const MAX_REDIRECTS: usize = 5;

pub struct FileSource;

impl FileSource {
    /// Resolves a path already inside `files_root` (the common case: a
    /// reference to a document the caller's own system already stores).
    /// Rejects traversal outside the root via `canonicalize` + prefix
    /// check — an ambient safety concern, not a feature the spec scopes
    /// out.
    pub async fn from_server_path(files_root: &Path, relative: &str) -> Result<PathRef> {
        let candidate = files_root.join(relative.trim_start_matches('/'));
        let canonical_root = tokio::fs::canonicalize(files_root)
            .await
            .map_err(|e| MediaError::internal(format!("bad files root: {e}")))?;
        let canonical = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|_| MediaError::bad_input(format!("no such file: {relative}")))?;
        if !canonical.starts_with(&canonical_root) {
            return Err(MediaError::bad_input(format!("path escapes files root: {relative}")));
        }
        PathRef::new(canonical, files_root).await
    }

    /// Downloads a URL origin to a temp file, enforcing `max_file_size`
    /// against the stream as it arrives rather than trusting
    /// `Content-Length` (a server can lie or omit it).
    pub async fn from_url(client: &reqwest::Client, url: &str, max_file_size: u64) -> Result<PathRef> {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::transport(format!("{url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(MediaError::transport(format!("{url}: HTTP {}", resp.status())));
        }

        let ext = Path::new(url)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let dest = temp_path(ext);
        let mut file = tokio::fs::File::create(&dest).await?;

        let mut received: u64 = 0;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::transport(format!("{url}: {e}")))?;
            received += chunk.len() as u64;
            if max_file_size > 0 && received > max_file_size {
                drop(file);
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(MediaError::bad_input("download exceeds max file size"));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        PathRef::new_temp(dest).await
    }

    pub fn http_client() -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
    }
}

fn temp_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pvs-{}.{ext}", uuid::Uuid::new_v4()))
}
