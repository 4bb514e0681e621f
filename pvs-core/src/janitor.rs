//! Background store sweeper, grounded on `preview/storage.py`'s
//! `cleanup()` and the periodic-task shape of
//! `ferrex-server::transcoding::cache`'s size-bounded eviction.
//!
//! Runs on a fixed interval, walks the store tree, and evicts entries by
//! age (if `store_max_age` is set) and then by total size (if
//! `cleanup_max_size` is set), oldest-by-atime first.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::metrics::Metrics;
use crate::store::PreviewStore;

pub struct Janitor {
    store: PreviewStore,
    base: PathBuf,
    interval: Duration,
    max_age: Option<Duration>,
    max_size: Option<u64>,
    metrics: Metrics,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub entries: u64,
    pub bytes: u64,
    pub evicted: u64,
}

impl Janitor {
    pub fn new(
        store: PreviewStore,
        base: PathBuf,
        interval: Duration,
        max_age: Option<Duration>,
        max_size: Option<u64>,
        metrics: Metrics,
    ) -> Self {
        Janitor { store, base, interval, max_age, max_size, metrics }
    }

    /// Runs forever on `interval`, logging a summary after every sweep.
    /// Meant to be `tokio::spawn`ed once at startup; never returns.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) => {
                    tracing::info!(
                        entries = report.entries,
                        bytes = report.bytes,
                        evicted = report.evicted,
                        "store sweep complete"
                    );
                    self.metrics.set_store_gauges(report.entries, report.bytes);
                }
                Err(err) => tracing::warn!(error = %err, "store sweep failed"),
            }
        }
    }

    pub async fn sweep(&self) -> std::io::Result<SweepReport> {
        if !self.store.enabled() {
            return Ok(SweepReport::default());
        }

        let mut entries = collect_entries(&self.base).await?;
        let mut report = SweepReport { entries: entries.len() as u64, bytes: entries.iter().map(|e| e.size).sum(), evicted: 0 };

        if let Some(max_age) = self.max_age {
            let cutoff = SystemTime::now().checked_sub(max_age);
            if let Some(cutoff) = cutoff {
                let (keep, evict): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.atime >= cutoff);
                report.evicted += evict.len() as u64;
                for e in &evict {
                    let _ = tokio::fs::remove_file(&e.path).await;
                }
                report.bytes -= evict.iter().map(|e| e.size).sum::<u64>();
                entries = keep;
            }
        }

        if let Some(max_size) = self.max_size {
            entries.sort_by_key(|e| e.atime);
            let mut total: u64 = entries.iter().map(|e| e.size).sum();
            let mut i = 0;
            while total > max_size && i < entries.len() {
                let e = &entries[i];
                let _ = tokio::fs::remove_file(&e.path).await;
                total = total.saturating_sub(e.size);
                report.evicted += 1;
                i += 1;
            }
            report.bytes = total;
        }

        report.entries -= report.evicted;
        Ok(report)
    }
}

struct Entry {
    path: PathBuf,
    size: u64,
    atime: SystemTime,
}

/// Recursively walks the two-level fanout directory collecting entry
/// files. Small enough (bounded by the store's two-character-equivalent
/// hex fanout) to do in memory per sweep.
async fn collect_entries(base: &PathBuf) -> std::io::Result<Vec<Entry>> {
    let mut out = Vec::new();
    let mut stack = vec![base.clone()];
    while let Some(dir) = stack.pop() {
        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        while let Some(entry) = rd.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                let atime = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
                out.push(Entry { path: entry.path(), size: meta.len(), atime });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweep_on_disabled_store_is_noop() {
        let store = PreviewStore::new(None);
        let janitor = Janitor::new(
            store,
            PathBuf::from("/nonexistent"),
            Duration::from_secs(60),
            None,
            None,
            Metrics::new_disabled(),
        );
        let report = janitor.sweep().await.unwrap();
        assert_eq!(report.entries, 0);
    }

    #[tokio::test]
    async fn size_eviction_drops_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        tokio::fs::create_dir_all(base.join("a").join("b")).await.unwrap();
        let old = base.join("a").join("b").join("old");
        let new = base.join("a").join("b").join("new");
        tokio::fs::write(&old, vec![0u8; 100]).await.unwrap();
        tokio::fs::write(&new, vec![0u8; 100]).await.unwrap();
        filetime::set_file_atime(&old, filetime::FileTime::from_unix_time(1, 0)).unwrap();
        filetime::set_file_atime(&new, filetime::FileTime::from_unix_time(2_000_000_000, 0)).unwrap();

        let store = PreviewStore::new(Some(base.clone()));
        let janitor = Janitor::new(store, base.clone(), Duration::from_secs(60), None, Some(150), Metrics::new_disabled());
        let report = janitor.sweep().await.unwrap();
        assert_eq!(report.evicted, 1);
        assert!(tokio::fs::metadata(&old).await.is_err());
        assert!(tokio::fs::metadata(&new).await.is_ok());
    }
}
