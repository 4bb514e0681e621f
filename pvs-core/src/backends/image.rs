//! Image-to-image backend, grounded on `preview/backends/image.py`'s
//! `resize_image` (ImageMagick `WxH>` geometry: shrink to fit, never
//! enlarge) composited onto a fixed-size canvas.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgba, RgbaImage};
use tokio::process::Command;

use super::{Backend, BackendContext};
use crate::error::{MediaError, Result};
use crate::pathref::PathRef;
use crate::request::{OutputFormat, PageRange, PreviewRequest};

/// Target pixel density recorded in produced previews, matching the
/// original service's `image.resolution = (300, 300)`.
pub const TARGET_DPI: u32 = 300;

pub const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

pub struct ImageBackend;

impl ImageBackend {
    pub fn new() -> Self {
        ImageBackend
    }

    /// Shrinks `src` to fit within `width`x`height` without enlarging it
    /// (ImageMagick's `WxH>` geometry), flattens any alpha onto white,
    /// and composites the result centered onto an opaque canvas of
    /// exactly `width`x`height`.
    pub fn render(src: &DynamicImage, width: u32, height: u32) -> RgbaImage {
        let (src_w, src_h) = src.dimensions();
        let scale = (width as f64 / src_w as f64)
            .min(height as f64 / src_h as f64)
            .min(1.0); // shrink-only: never scale up past 1.0

        let (fit_w, fit_h) = if scale >= 1.0 {
            (src_w, src_h)
        } else {
            (
                ((src_w as f64 * scale).round() as u32).max(1),
                ((src_h as f64 * scale).round() as u32).max(1),
            )
        };

        let resized = if (fit_w, fit_h) == (src_w, src_h) {
            src.clone()
        } else {
            src.resize(fit_w, fit_h, FilterType::Lanczos3)
        };

        let flattened = flatten_to_white(&resized);

        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let x_off = (width.saturating_sub(flattened.width())) / 2;
        let y_off = (height.saturating_sub(flattened.height())) / 2;
        image::imageops::overlay(&mut canvas, &flattened, x_off as i64, y_off as i64);
        canvas
    }
}

impl Default for ImageBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_to_white(img: &DynamicImage) -> RgbaImage {
    let rgba = img.to_rgba8();
    let mut out = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        out.put_pixel(x, y, Rgba([blend(r), blend(g), blend(b), 255]));
    }
    out
}

#[async_trait]
impl Backend for ImageBackend {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    async fn preview(&self, req: &mut PreviewRequest, ctx: &BackendContext) -> Result<()> {
        if !matches!(req.format, OutputFormat::Image | OutputFormat::Pdf) {
            return Err(MediaError::InvalidFormat { backend: self.name(), format: req.format.as_str().to_string() });
        }
        // The image backend only ever produces a single page; any other
        // page range is a caller error, not something to silently clamp.
        if req.pages != PageRange::SINGLE_FIRST {
            return Err(MediaError::invalid_page("image backend only supports pages=(1,1)"));
        }

        let src_path = req.src().path().to_path_buf();
        let (width, height) = (req.width, req.height);
        let started = Instant::now();

        let _permit = ctx.pools.acquire_default().await;
        let canvas = tokio::task::spawn_blocking(move || -> Result<RgbaImage> {
            let decoded = image::open(&src_path).map_err(MediaError::from)?;
            Ok(ImageBackend::render(&decoded, width, height))
        })
        .await
        .map_err(|e| MediaError::internal(format!("image decode task panicked: {e}")))??;

        let dest = temp_png_path();
        let dest_for_save = dest.clone();
        tokio::task::spawn_blocking(move || canvas.save(&dest_for_save))
            .await
            .map_err(|e| MediaError::internal(format!("image encode task panicked: {e}")))?
            .map_err(MediaError::from)?;

        let dst = match req.format {
            OutputFormat::Image => PathRef::new_temp(dest).await?,
            OutputFormat::Pdf => {
                let wrapped = wrap_as_single_page_pdf(&dest).await?;
                tokio::fs::remove_file(&dest).await.ok();
                PathRef::new_temp(wrapped).await?
            }
        };
        req.set_dst(dst).await;

        ctx.metrics.record_preview(self.name(), &req.extension, req.format.as_str(), &started.elapsed());
        Ok(())
    }
}

fn temp_png_path() -> PathBuf {
    std::env::temp_dir().join(format!("pvs-{}.png", uuid::Uuid::new_v4()))
}

/// Wraps a rendered raster page as a single-page PDF via ImageMagick's
/// `convert`, the same external-tool-as-collaborator pattern used for
/// ghostscript in [`super::pdf`]: the `image` crate has no PDF encoder,
/// and `convert input.png output.pdf` is the standard way to get one
/// page of raster content into a PDF container.
async fn wrap_as_single_page_pdf(png_path: &std::path::Path) -> Result<PathBuf> {
    let dest = std::env::temp_dir().join(format!("pvs-{}.pdf", uuid::Uuid::new_v4()));
    let output = Command::new("convert")
        .arg(png_path)
        .arg(&dest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| MediaError::transport(format!("failed to spawn convert: {e}")))?;

    if !output.status.success() {
        return Err(MediaError::transport(format!(
            "convert exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn shrink_only_never_upscales() {
        let src = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let out = ImageBackend::render(&src, 200, 200);
        // A 10x10 source requested at 200x200 stays 10x10 inside a
        // 200x200 canvas; it must not be blown up to fill it.
        assert_eq!(out.width(), 200);
        assert_eq!(out.height(), 200);
        // corner pixel should be canvas white, not part of the source
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn shrinks_large_source_to_fit() {
        let src = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let out = ImageBackend::render(&src, 100, 100);
        assert_eq!(out.width(), 100);
        assert_eq!(out.height(), 100);
    }
}
