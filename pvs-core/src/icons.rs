//! Error-to-icon fallback, grounded on `preview/icons.py`.
//!
//! When a backend can't produce a real preview, the coordinator serves a
//! generic icon instead of surfacing an error to the caller (spec.md
//! §4.6). Icons are pre-rendered at a handful of fixed dimensions, laid
//! out dimension-first on disk (`{dim}/{extension}.png`, with a
//! `{dim}/default.png` fallback for extensions with no dedicated icon),
//! per `preview/icons.py:44`
//! (`pathjoin(ICON_ROOT, str(bestdim), '%s.png' % extension)`). The
//! fallback picks whichever pre-rendered size is closest without being
//! smaller than what was asked for, falling back to the single largest
//! size on disk if nothing is big enough.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, Result};

/// The filename stem used when a dimension directory has no icon
/// specific to the requested extension.
const DEFAULT_STEM: &str = "default";

#[derive(Debug, Clone)]
pub struct IconFallback {
    /// dimension -> (extension-or-"default" -> path on disk), dimensions
    /// kept sorted by `BTreeMap`'s natural ordering.
    icons: BTreeMap<u32, BTreeMap<String, PathBuf>>,
    redirect_base: Option<String>,
    resize: bool,
}

impl IconFallback {
    /// Scans `root` for directories named by dimension
    /// (`<dim>/<extension>.<ext>` or `<dim>/default.<ext>`), per the
    /// original layout in `preview/icons.py`.
    pub async fn load(root: Option<&Path>) -> Result<Self> {
        let mut icons = BTreeMap::new();
        if let Some(root) = root {
            let mut dim_dirs = tokio::fs::read_dir(root).await?;
            while let Some(dim_entry) = dim_dirs.next_entry().await? {
                if !dim_entry.file_type().await?.is_dir() {
                    continue;
                }
                let Ok(dim) = dim_entry.file_name().to_string_lossy().parse::<u32>() else {
                    continue;
                };
                let mut stems = BTreeMap::new();
                let mut files = tokio::fs::read_dir(dim_entry.path()).await?;
                while let Some(file) = files.next_entry().await? {
                    let name = file.file_name().to_string_lossy().to_string();
                    if let Some((stem, _ext)) = name.split_once('.') {
                        stems.insert(stem.to_string(), file.path());
                    }
                }
                icons.insert(dim, stems);
            }
        }
        Ok(IconFallback { icons, redirect_base: None, resize: false })
    }

    pub fn with_redirect(mut self, base: Option<String>, resize: bool) -> Self {
        self.redirect_base = base;
        self.resize = resize;
        self
    }

    /// Picks the icon file sized for a `width`x`height` request, falling
    /// back to a generic `"default"` icon within that size if
    /// `extension` has no dedicated icon.
    ///
    /// Walks the available dimensions in ascending order, remembering
    /// each as `best` until one is `>= max(width, height)`; if none
    /// qualifies, `best` ends up the largest dimension available. This
    /// mirrors `icons.py`'s loop exactly rather than a cleaner
    /// `min_by_key` search, since the original's behavior on an empty or
    /// all-too-small set (silently keeping the last-seen value) is worth
    /// preserving as-is.
    pub fn select(&self, extension: &str, width: u32, height: u32) -> Result<&Path> {
        let target = width.max(height);
        let mut best: Option<&BTreeMap<String, PathBuf>> = None;
        for (dim, stems) in &self.icons {
            best = Some(stems);
            if *dim >= target {
                break;
            }
        }
        let stems = best.ok_or_else(|| MediaError::internal("no icon sizes available"))?;

        stems
            .get(extension)
            .or_else(|| stems.get(DEFAULT_STEM))
            .map(|p| p.as_path())
            .ok_or_else(|| MediaError::internal("no icon available for this size"))
    }

    pub fn redirect_url(&self, extension: &str, width: u32, height: u32) -> Option<String> {
        let base = self.redirect_base.as_ref()?;
        Some(format!("{base}/{extension}/{width}x{height}"))
    }

    pub fn resize_on_redirect(&self) -> bool {
        self.resize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback_with(dims: &[(u32, &[&str])]) -> IconFallback {
        let mut icons = BTreeMap::new();
        for (dim, stems) in dims {
            let mut by_stem = BTreeMap::new();
            for stem in *stems {
                by_stem.insert(stem.to_string(), PathBuf::from(format!("{dim}/{stem}.png")));
            }
            icons.insert(*dim, by_stem);
        }
        IconFallback { icons, redirect_base: None, resize: false }
    }

    #[test]
    fn picks_smallest_that_fits() {
        let fb = fallback_with(&[(16, &["default"]), (32, &["default"]), (64, &["pdf"]), (128, &["default"])]);
        let path = fb.select("pdf", 50, 20).unwrap();
        assert_eq!(path, Path::new("64/pdf.png"));
    }

    #[test]
    fn falls_back_to_largest_when_nothing_fits() {
        let fb = fallback_with(&[(16, &["default"]), (32, &["default"]), (64, &["default"])]);
        let path = fb.select("pdf", 500, 500).unwrap();
        assert_eq!(path, Path::new("64/default.png"));
    }

    #[test]
    fn extension_without_dedicated_icon_uses_default() {
        let fb = fallback_with(&[(32, &["default", "pdf"])]);
        let path = fb.select("docx", 10, 10).unwrap();
        assert_eq!(path, Path::new("32/default.png"));
    }

    #[test]
    fn extension_specific_icon_wins_over_default() {
        let fb = fallback_with(&[(32, &["default", "pdf"])]);
        let path = fb.select("pdf", 10, 10).unwrap();
        assert_eq!(path, Path::new("32/pdf.png"));
    }
}
