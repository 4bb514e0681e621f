//! Content-addressed preview store, grounded on `preview/storage.py`
//! (`make_key`/`make_path`/`get`/`put`/`cleanup`) and the staleness/LRU
//! shape of `ferrex-server::transcoding::cache`.
//!
//! Entries are addressed by a SHA-256 hex digest of the tuple that fully
//! determines a preview's bytes: origin, output format, width, height,
//! and page range. A cached entry is stale (and must be regenerated) if
//! its origin file's mtime is newer than the entry's own mtime; reads
//! bump the entry's atime so eviction can use genuine last-use ordering.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::request::PreviewRequest;

#[derive(Debug, Clone)]
pub struct PreviewStore {
    base: Option<PathBuf>,
}

/// Outcome of a store lookup: whether the entry both exists and is
/// fresh, plus the key so a miss can be `put()` under the same name
/// without recomputing it.
pub struct Lookup {
    pub hit: bool,
    pub key: String,
    pub path: PathBuf,
}

impl PreviewStore {
    pub fn new(base: Option<PathBuf>) -> Self {
        PreviewStore { base }
    }

    pub fn enabled(&self) -> bool {
        self.base.is_some()
    }

    /// SHA-256 hex digest of `origin|format|width|height|first-last`.
    /// A request with no origin (a raw upload) is never cacheable and
    /// has no meaningful key; callers must check `req.origin` first.
    pub fn key(req: &PreviewRequest) -> Option<String> {
        let origin = req.origin.as_ref()?;
        let material = format!(
            "{origin}|{}|{}|{}|{}-{}",
            req.format.as_str(),
            req.width,
            req.height,
            req.pages.first,
            req.pages.last,
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        Some(hex::encode(hasher.finalize()))
    }

    /// Two single-character directory levels under `base`, per the
    /// literal `base/{key[0]}/{key[1]}/{key}` layout: the store is
    /// expected to hold on the order of thousands of distinct sources,
    /// not the tens of millions a two-character fanout is sized for.
    pub fn path(&self, key: &str) -> Option<PathBuf> {
        let base = self.base.as_ref()?;
        Some(base.join(&key[0..1]).join(&key[1..2]).join(key))
    }

    /// Looks up `req`'s entry. Returns `hit: false` whenever the store is
    /// disabled, the request has no origin, the entry doesn't exist, or
    /// it exists but is older than the origin file's current mtime.
    pub async fn get(&self, req: &PreviewRequest, origin_path: &Path) -> Result<Lookup> {
        let Some(key) = Self::key(req) else {
            return Ok(Lookup { hit: false, key: String::new(), path: PathBuf::new() });
        };
        let Some(path) = self.path(&key) else {
            return Ok(Lookup { hit: false, key, path: PathBuf::new() });
        };

        let entry_meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(Lookup { hit: false, key, path }),
        };

        let stale = match tokio::fs::metadata(origin_path).await {
            Ok(origin_meta) => modified_or_epoch(&origin_meta) > modified_or_epoch(&entry_meta),
            // Origin vanished (e.g. a one-shot upload already cleaned up);
            // an existing entry can't be compared, so trust it.
            Err(_) => false,
        };

        if stale {
            return Ok(Lookup { hit: false, key, path });
        }

        touch_atime(&path).await;
        Ok(Lookup { hit: true, key, path })
    }

    /// Atomically moves `from` into the store under `key`, creating
    /// parent directories as needed, then stamps the entry's mtime with
    /// `origin_mtime` (the mtime the source had at put-time). Preserving
    /// that mtime -- rather than leaving it at move-time -- is the
    /// invariant the staleness check in `get()` depends on: a later
    /// comparison against the origin's *current* mtime only detects a
    /// change if the entry still records what the origin's mtime was
    /// when the entry was written (spec.md §9). Silently no-ops on
    /// disk-full (`ENOSPC`) or a missing origin mtime: a cache write
    /// failure must never fail the request it's serving.
    pub async fn put(&self, key: &str, from: &Path, origin_mtime: Option<SystemTime>) -> Result<Option<PathBuf>> {
        let Some(dest) = self.path(key) else { return Ok(None) };
        if let Some(parent) = dest.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(error = %err, "store: failed to create parent dirs");
                return Ok(None);
            }
        }

        if let Err(err) = move_into_place(from, &dest).await {
            if err.raw_os_error() == Some(ENOSPC) {
                tracing::warn!("store: disk full, skipping cache write");
            } else {
                tracing::warn!(error = %err, "store: failed to write entry");
            }
            return Ok(None);
        }

        if let Some(mtime) = origin_mtime {
            let dest_for_stamp = dest.clone();
            let ft = filetime::FileTime::from_system_time(mtime);
            let result = tokio::task::spawn_blocking(move || filetime::set_file_mtime(&dest_for_stamp, ft)).await;
            if let Ok(Err(err)) = result {
                tracing::warn!(error = %err, "store: failed to stamp entry mtime");
            }
        }

        Ok(Some(dest))
    }
}

/// Renames `from` into `dest`, falling back to copy-then-remove when
/// they live on different filesystems (`rename` returns `EXDEV`) -- the
/// store base and the process temp directory are not guaranteed to be
/// the same mount.
async fn move_into_place(from: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, dest).await {
        Ok(()) => Ok(()),
        Err(err) if err.raw_os_error() == Some(EXDEV) => {
            tokio::fs::copy(from, dest).await?;
            tokio::fs::remove_file(from).await?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn modified_or_epoch(meta: &std::fs::Metadata) -> SystemTime {
    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Bumps the entry's atime to now so age-based eviction reflects last
/// use rather than creation time. Failure is logged and ignored: a
/// missed atime bump degrades eviction precision, not correctness.
async fn touch_atime(path: &Path) {
    let now = filetime::FileTime::now();
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || filetime::set_file_atime(&path, now)).await;
    if let Ok(Err(err)) = result {
        tracing::debug!(error = %err, "store: failed to touch atime");
    }
}

const ENOSPC: i32 = 28;
const EXDEV: i32 = 18;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathref::PathRef;
    use crate::request::{OutputFormat, PageRange, PreviewRequest, StoreFlag};

    async fn make_req(origin: &str) -> PreviewRequest {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("in.png");
        tokio::fs::write(&src_path, b"x").await.unwrap();
        let src = PathRef::new_temp(src_path).await.unwrap();
        std::mem::forget(dir);
        PreviewRequest::new(
            "in.png".into(),
            OutputFormat::Image,
            100,
            100,
            PageRange::SINGLE_FIRST,
            StoreFlag::Unset,
            Some(origin.into()),
            src,
        )
    }

    #[tokio::test]
    async fn key_is_stable_for_identical_requests() {
        let a = make_req("/mnt/files/a.png").await;
        let b = make_req("/mnt/files/a.png").await;
        assert_eq!(PreviewStore::key(&a), PreviewStore::key(&b));
    }

    #[test]
    fn path_uses_single_char_fanout() {
        let base = PathBuf::from("/var/cache/pvs");
        let store = PreviewStore::new(Some(base.clone()));
        let key = "ab12cd34";
        let path = store.path(key).unwrap();
        assert_eq!(path, base.join("a").join("b").join(key));
    }

    #[tokio::test]
    async fn miss_when_disabled() {
        let store = PreviewStore::new(None);
        let req = make_req("/mnt/files/a.png").await;
        let lookup = store.get(&req, Path::new("/mnt/files/a.png")).await.unwrap();
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreviewStore::new(Some(dir.path().join("store")));
        let req = make_req("origin-key").await;
        let key = PreviewStore::key(&req).unwrap();
        let entry_path = store.path(&key).unwrap();
        tokio::fs::create_dir_all(entry_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&entry_path, b"cached").await.unwrap();

        let origin = dir.path().join("origin.png");
        tokio::fs::write(&origin, b"newer").await.unwrap();
        // Ensure the origin's mtime is observably newer than the entry's.
        let future = filetime::FileTime::from_unix_time(
            filetime::FileTime::now().seconds() + 60,
            0,
        );
        filetime::set_file_mtime(&origin, future).unwrap();

        let lookup = store.get(&req, &origin).await.unwrap();
        assert!(!lookup.hit);
    }
}
