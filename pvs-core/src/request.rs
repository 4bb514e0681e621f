//! [`PreviewRequest`]: the unit of work that flows through a backend,
//! grounded on the original service's `PreviewModel` (`preview/models.py`)
//! and the query-string handling in `preview/__init__.py`.

use crate::error::{MediaError, Result};
use crate::pathref::PathRef;

/// The artifact a backend is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Image,
    Pdf,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "image" => Ok(OutputFormat::Image),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(MediaError::bad_input(format!("unknown format {other:?}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Image => "image",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Whether the caller expressed an opinion on store use via `?store=`.
/// Three states, not a bool: absence means "defer to server policy",
/// which is different from an explicit `store=0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFlag {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl StoreFlag {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => StoreFlag::Unset,
            Some(s) if pvs_config::boolean(Some(s)) => StoreFlag::Enabled,
            Some(_) => StoreFlag::Disabled,
        }
    }

    pub fn allows_store(self, default_enabled: bool) -> bool {
        match self {
            StoreFlag::Unset => default_enabled,
            StoreFlag::Enabled => true,
            StoreFlag::Disabled => false,
        }
    }
}

/// Inclusive 1-based (first, last) page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub const SINGLE_FIRST: PageRange = PageRange { first: 1, last: 1 };

    pub fn count(&self) -> u32 {
        self.last.saturating_sub(self.first) + 1
    }

    /// Parses the `pages` query parameter.
    ///
    /// - absent/empty -> page 1 only
    /// - `"all"` -> 1..=max_pages (or 1..=u32::MAX if no cap is configured)
    /// - a single integer `"n"` -> page n only
    /// - `"n-m"` -> pages n..=m, clamped to max_pages when one is configured
    /// - anything else -> `MediaError::BadInput`
    pub fn parse(raw: Option<&str>, max_pages: u32) -> Result<Self> {
        let cap = if max_pages == 0 { u32::MAX } else { max_pages };
        let raw = match raw {
            None => return Ok(PageRange::SINGLE_FIRST),
            Some(s) if s.is_empty() => return Ok(PageRange::SINGLE_FIRST),
            Some(s) => s,
        };

        if raw == "all" {
            return Ok(PageRange { first: 1, last: cap });
        }

        if let Ok(n) = raw.parse::<u32>() {
            if n == 0 {
                return Err(MediaError::bad_input("page numbers are 1-based"));
            }
            return Ok(PageRange { first: n, last: n });
        }

        if let Some((a, b)) = raw.split_once('-') {
            let first: u32 = a
                .parse()
                .map_err(|_| MediaError::bad_input(format!("bad page range {raw:?}")))?;
            let last: u32 = b
                .parse()
                .map_err(|_| MediaError::bad_input(format!("bad page range {raw:?}")))?;
            if first == 0 || last < first {
                return Err(MediaError::bad_input(format!("bad page range {raw:?}")));
            }
            return Ok(PageRange { first, last: last.min(cap) });
        }

        Err(MediaError::bad_input(format!("bad page range {raw:?}")))
    }
}

/// The unit of work a [`crate::backends::Backend`] operates on.
///
/// `src`/`dst` use an ownership-transfer pattern: replacing either field
/// goes through [`PreviewRequest::set_src`]/[`PreviewRequest::set_dst`],
/// which clean up the value being displaced if it was a temp file. This
/// stands in for the original `PathModel` property setters
/// (`preview/models.py`), which did the same thing on plain attribute
/// assignment — Rust has no assignment hooks, so the transfer is made an
/// explicit method instead of a REDESIGN FLAG silently dropping the
/// behavior.
#[derive(Debug)]
pub struct PreviewRequest {
    pub name: String,
    pub extension: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub pages: PageRange,
    pub store: StoreFlag,
    pub origin: Option<String>,
    src: PathRef,
    dst: Option<PathRef>,
}

impl PreviewRequest {
    pub fn new(
        name: String,
        format: OutputFormat,
        width: u32,
        height: u32,
        pages: PageRange,
        store: StoreFlag,
        origin: Option<String>,
        src: PathRef,
    ) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        PreviewRequest {
            name,
            extension,
            format,
            width,
            height,
            pages,
            store,
            origin,
            src,
            dst: None,
        }
    }

    pub fn src(&self) -> &PathRef {
        &self.src
    }

    pub fn dst(&self) -> Option<&PathRef> {
        self.dst.as_ref()
    }

    /// Replaces `src`, cleaning up the previous value if it was temp.
    /// Used when a backend delegates to another (office -> pdf -> image):
    /// the intermediate PDF becomes the new `src` for the next stage.
    pub async fn set_src(&mut self, new_src: PathRef) {
        let old = std::mem::replace(&mut self.src, new_src);
        old.cleanup().await;
    }

    /// Replaces `dst`, cleaning up any previous output (a retried
    /// conversion that produced a partial file before failing).
    pub async fn set_dst(&mut self, new_dst: PathRef) {
        if let Some(old) = self.dst.replace(new_dst) {
            old.cleanup().await;
        }
    }

    /// Consumes the request, releasing `src` (if temp) and returning
    /// `dst`, the caller's responsibility from here on.
    pub async fn finish(self) -> Option<PathRef> {
        self.src.cleanup().await;
        self.dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_is_page_one() {
        assert_eq!(PageRange::parse(None, 0).unwrap(), PageRange { first: 1, last: 1 });
        assert_eq!(PageRange::parse(Some(""), 0).unwrap(), PageRange { first: 1, last: 1 });
    }

    #[test]
    fn all_uses_max_pages_cap() {
        assert_eq!(PageRange::parse(Some("all"), 10).unwrap(), PageRange { first: 1, last: 10 });
        assert_eq!(PageRange::parse(Some("all"), 0).unwrap().first, 1);
    }

    #[test]
    fn single_digit_is_that_page_alone() {
        assert_eq!(PageRange::parse(Some("3"), 0).unwrap(), PageRange { first: 3, last: 3 });
    }

    #[test]
    fn range_is_clamped_to_cap() {
        assert_eq!(PageRange::parse(Some("2-9"), 5).unwrap(), PageRange { first: 2, last: 5 });
        assert_eq!(PageRange::parse(Some("2-4"), 0).unwrap(), PageRange { first: 2, last: 4 });
    }

    #[test]
    fn garbage_is_bad_input() {
        assert!(PageRange::parse(Some("nope"), 0).is_err());
        assert!(PageRange::parse(Some("0"), 0).is_err());
        assert!(PageRange::parse(Some("5-2"), 0).is_err());
    }

    #[test]
    fn store_flag_defers_when_unset() {
        assert!(StoreFlag::Unset.allows_store(true));
        assert!(!StoreFlag::Unset.allows_store(false));
        assert!(StoreFlag::Enabled.allows_store(false));
        assert!(!StoreFlag::Disabled.allows_store(true));
    }
}
