//! Backend dispatch, grounded on `preview/backends/base.py`'s `Backend`
//! base class with one REDESIGN FLAG applied (spec.md §9): the original
//! picks a method at runtime via `getattr(self, '_preview_%s' % format)`;
//! a statically typed `Backend` can't grow methods by string, so each
//! backend implements a single `preview` that matches on
//! [`crate::request::OutputFormat`] explicitly.

pub mod image;
pub mod office;
pub mod pdf;
pub mod video;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::metrics::Metrics;
use crate::request::PreviewRequest;
use crate::worker_pool::WorkerPools;

pub use image::ImageBackend;
pub use office::OfficeBackend;
pub use pdf::PdfBackend;
pub use video::VideoBackend;

/// Shared collaborators every backend needs: worker pools for
/// concurrency control, metrics for observability, and (for the
/// office/pdf backends that delegate downstream) handles to the
/// backends they hand off to.
#[derive(Clone)]
pub struct BackendContext {
    pub pools: WorkerPools,
    pub metrics: Metrics,
    pub pdf: Arc<PdfBackend>,
    pub image: Arc<ImageBackend>,
    pub soffice_addr: String,
    pub soffice_port: u16,
    pub soffice_timeout: std::time::Duration,
    pub soffice_retry: u32,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// File extensions (lowercase, no dot) this backend handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Produces `req.dst` from `req.src`, mutating `req` in place.
    /// Implementations that delegate (office -> pdf -> image) update
    /// `req.src` via [`PreviewRequest::set_src`] between stages so the
    /// intermediate file's cleanup is never the caller's job.
    async fn preview(&self, req: &mut PreviewRequest, ctx: &BackendContext) -> Result<()>;
}
