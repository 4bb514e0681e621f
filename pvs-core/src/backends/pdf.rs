//! PDF backend, grounded on `preview/backends/pdf.py`'s ghostscript
//! invocation. Two outputs are supported: a normalized PDF subrange
//! (format `pdf`) and a single rasterized page handed off to
//! [`super::ImageBackend`] for resizing (format `image`).
//!
//! Ghostscript is treated as an opaque external collaborator, shelled
//! out to exactly like `soffice` is from [`super::office`] — its exact
//! rendering behavior is out of scope (spec.md Non-goals).

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Backend, BackendContext};
use crate::error::{MediaError, Result};
use crate::pathref::PathRef;
use crate::request::{OutputFormat, PageRange, PreviewRequest};

pub const EXTENSIONS: &[&str] = &["pdf"];

/// US Letter page dimensions in inches, used to derive a rendering
/// resolution from a pixel size when no page geometry is known ahead of
/// time (ghostscript is asked to render, not measure, the source).
const PAGE_WIDTH_IN: f64 = 8.5;
const PAGE_HEIGHT_IN: f64 = 11.0;

pub struct PdfBackend;

impl PdfBackend {
    pub fn new() -> Self {
        PdfBackend
    }

    /// Derives a ghostscript `-r` resolution from a target pixel size:
    /// the naive DPI needed to fill `width`x`height` on a Letter page,
    /// rounded up to the next multiple of 144 and then halved. Rendering
    /// at double the final resolution and letting the resize step in
    /// [`super::ImageBackend`] downsample gives noticeably cleaner
    /// antialiasing than rendering directly at the target DPI.
    pub fn resolution(width: u32, height: u32) -> u32 {
        let raw = (width as f64 / PAGE_WIDTH_IN).max(height as f64 / PAGE_HEIGHT_IN);
        let rounded = ((raw / 144.0).ceil() * 144.0) as u32;
        (rounded.max(144) / 2).max(72)
    }
}

impl Default for PdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for PdfBackend {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    async fn preview(&self, req: &mut PreviewRequest, ctx: &BackendContext) -> Result<()> {
        if req.src().size() == 0 {
            return Err(MediaError::bad_input("empty source file"));
        }

        let started = Instant::now();
        let _permit = ctx.pools.acquire_default().await;

        match req.format {
            OutputFormat::Pdf => self.extract_pages(req).await?,
            OutputFormat::Image => self.rasterize_page(req, ctx).await?,
        }

        ctx.metrics.record_preview(self.name(), &req.extension, req.format.as_str(), &started.elapsed());
        Ok(())
    }
}

impl PdfBackend {
    async fn extract_pages(&self, req: &mut PreviewRequest) -> Result<()> {
        let dest = std::env::temp_dir().join(format!("pvs-{}.pdf", uuid::Uuid::new_v4()));
        run_ghostscript(&[
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-sDEVICE=pdfwrite".into(),
            format!("-dFirstPage={}", req.pages.first),
            format!("-dLastPage={}", req.pages.last),
            format!("-sOutputFile={}", dest.display()),
            req.src().path().display().to_string(),
        ])
        .await?;
        let dst = PathRef::new_temp(dest).await?;
        req.set_dst(dst).await;
        Ok(())
    }

    async fn rasterize_page(&self, req: &mut PreviewRequest, ctx: &BackendContext) -> Result<()> {
        let page = req.pages.first;
        let resolution = Self::resolution(req.width, req.height);
        let rasterized = std::env::temp_dir().join(format!("pvs-{}.png", uuid::Uuid::new_v4()));

        run_ghostscript(&[
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-sDEVICE=png16m".into(),
            format!("-r{resolution}"),
            format!("-dFirstPage={page}"),
            format!("-dLastPage={page}"),
            format!("-sOutputFile={}", rasterized.display()),
            req.src().path().display().to_string(),
        ])
        .await?;

        let raster_ref = PathRef::new_temp(rasterized).await?;
        req.set_src(raster_ref).await;
        // The image backend enforces pages == (1, 1); the rasterized
        // output is always a single page regardless of which page of
        // the source it came from.
        req.pages = PageRange::SINGLE_FIRST;
        ctx.image.preview(req, ctx).await
    }
}

/// Substrings ghostscript emits on stderr when `-dFirstPage`/`-dLastPage`
/// fall outside the document's actual page count.
const PAGE_RANGE_ERROR_MARKERS: &[&str] = &["FirstPage", "LastPage"];

async fn run_ghostscript(args: &[String]) -> Result<()> {
    let output = Command::new("gs")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| MediaError::transport(format!("failed to spawn gs: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if PAGE_RANGE_ERROR_MARKERS.iter().any(|marker| stderr.contains(marker)) {
            return Err(MediaError::invalid_page(format!("page range out of bounds: {stderr}")));
        }
        return Err(MediaError::transport(format!("gs exited with {}: {stderr}", output.status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_rounds_up_to_144_multiple_then_halves() {
        // 800x600 target -> naive DPI ~94 (800/8.5) -> rounds to 144 -> 72
        assert_eq!(PdfBackend::resolution(800, 600), 72);
        // A much larger target drives the rounded value past one 144 step.
        assert_eq!(PdfBackend::resolution(1300, 600), 144);
    }

    #[test]
    fn resolution_has_a_floor() {
        assert_eq!(PdfBackend::resolution(1, 1), 72);
    }
}
