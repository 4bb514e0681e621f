//! Request coordinator: the full per-request lifecycle (store lookup,
//! backend dispatch, icon fallback, store population), grounded on
//! `preview/__init__.py`'s `handle_get`/`handle_post` and on
//! `ferrex-server::media::prep::thumbnail_service`'s cache-check ->
//! generate -> cache-populate shape.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backends::BackendContext;
use crate::error::{MediaError, Result};
use crate::icons::IconFallback;
use crate::pathref::PathRef;
use crate::registry::BackendRegistry;
use crate::request::PreviewRequest;
use crate::store::PreviewStore;

/// What the coordinator produced, and who owns cleaning it up.
pub enum PreviewOutcome {
    /// Served straight from the store: a shared file the coordinator
    /// must not delete.
    Stored(PathBuf),
    /// Freshly generated this request: the caller streams it and then
    /// must call [`PathRef::cleanup`].
    Generated(PathRef),
    /// An icon substituted for a failed or unsupported conversion:
    /// a static asset, never deleted.
    Icon(PathBuf),
}

impl PreviewOutcome {
    pub fn path(&self) -> &Path {
        match self {
            PreviewOutcome::Stored(p) => p,
            PreviewOutcome::Generated(r) => r.path(),
            PreviewOutcome::Icon(p) => p,
        }
    }
}

pub struct Coordinator {
    registry: BackendRegistry,
    store: PreviewStore,
    icons: IconFallback,
    ctx: BackendContext,
    store_default_enabled: bool,
    max_width: u32,
    max_height: u32,
}

impl Coordinator {
    pub fn new(
        registry: BackendRegistry,
        store: PreviewStore,
        icons: IconFallback,
        ctx: BackendContext,
        store_default_enabled: bool,
        max_width: u32,
        max_height: u32,
    ) -> Self {
        Coordinator { registry, store, icons, ctx, store_default_enabled, max_width, max_height }
    }

    /// Runs the full pipeline for one request. Never returns an error for
    /// a conversion failure or an unsupported input type -- both degrade
    /// to an icon (spec.md §4.6). A hard error here means the request
    /// itself was unservable (bad input, no icon family available).
    pub async fn handle(&self, mut req: PreviewRequest, origin_path: Option<&Path>) -> Result<PreviewOutcome> {
        req.width = req.width.clamp(1, self.max_width);
        req.height = req.height.clamp(1, self.max_height);

        let wants_store = req.store.allows_store(self.store_default_enabled) && self.store.enabled();

        if wants_store {
            if let Some(origin) = origin_path {
                let lookup = self.store.get(&req, origin).await?;
                if lookup.hit {
                    self.ctx.metrics.record_store_hit();
                    req.finish().await;
                    return Ok(PreviewOutcome::Stored(lookup.path));
                }
                self.ctx.metrics.record_store_miss();
            }
        }

        let backend = match self.registry.select(&req.extension) {
            Ok(b) => b,
            Err(err) => {
                tracing::debug!(extension = %req.extension, error = %err, "no backend for extension, falling back to icon");
                return self.icon_outcome(&req).await;
            }
        };

        if let Err(err) = backend.preview(&mut req, &self.ctx).await {
            self.ctx.metrics.record_error(backend.name(), &req.extension, req.format.as_str());

            // InvalidPage is a caller error (bad page range against this
            // specific source), not a conversion failure: it must reach
            // the HTTP layer as a 400, never be masked by an icon
            // (spec.md §4.6 step 5 / §7).
            if matches!(err, MediaError::InvalidPage(_)) {
                req.finish().await;
                return Err(err);
            }

            tracing::warn!(backend = backend.name(), error = %err, "preview generation failed, falling back to icon");
            return self.icon_outcome(&req).await;
        }

        let key = PreviewStore::key(&req);
        let generated = req
            .dst()
            .cloned()
            .ok_or_else(|| crate::error::MediaError::internal("backend reported success with no output"))?;

        let stored_path = if wants_store {
            match &key {
                Some(key) => {
                    let origin_mtime = match origin_path {
                        Some(p) => tokio::fs::metadata(p).await.ok().and_then(|m| m.modified().ok()),
                        None => None,
                    };
                    self.store.put(key, generated.path(), origin_mtime).await?
                }
                None => None,
            }
        } else {
            None
        };

        req.finish().await;
        match stored_path {
            // `store.put` already moved the temp file into the store;
            // there's nothing left at `generated`'s path to clean up.
            Some(path) => Ok(PreviewOutcome::Stored(path)),
            None => Ok(PreviewOutcome::Generated(generated)),
        }
    }

    async fn icon_outcome(&self, req: &PreviewRequest) -> Result<PreviewOutcome> {
        let icon_path = self.icons.select(&req.extension, req.width, req.height)?.to_path_buf();
        Ok(PreviewOutcome::Icon(icon_path))
    }
}

/// Helper for callers (the HTTP layer) that also want to know whether to
/// respond with a redirect vs. streaming bytes directly, per the
/// configured `X-Accel-Redirect` base path.
pub fn response_form(x_accel_redirect: &Option<String>, outcome: &PreviewOutcome) -> ResponseForm {
    match (x_accel_redirect, outcome) {
        (Some(base), PreviewOutcome::Stored(path)) => ResponseForm::AccelRedirect(format!("{base}/{}", path.display())),
        _ => ResponseForm::Stream,
    }
}

pub enum ResponseForm {
    Stream,
    AccelRedirect(String),
}

pub type SharedCoordinator = Arc<Coordinator>;
