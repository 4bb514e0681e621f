//! Prometheus metrics, grounded on the handler pattern in
//! `other_examples/.../materialize-src-http-util-src-lib.rs` (registry +
//! `TextEncoder` render) and treated as an ambient concern the way
//! `ferrex-server` carries its own metrics regardless of which product
//! features are enabled.
//!
//! A [`Metrics`] handle always exists, even when `PVS_METRICS` is unset —
//! recording into an unregistered-but-constructed handle costs a few
//! atomic increments and keeps the rest of the pipeline from needing two
//! code paths.

use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    enabled: bool,
    previews_total: IntCounterVec,
    preview_errors_total: IntCounterVec,
    preview_duration_seconds: HistogramVec,
    store_hits_total: IntCounter,
    store_misses_total: IntCounter,
    store_bytes: IntGauge,
    store_entries: IntGauge,
    transfers_in_progress: IntGaugeVec,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        let registry = Registry::new();

        let previews_total = IntCounterVec::new(
            Opts::new("previews_total", "Previews produced, by backend/extension/format"),
            &["backend", "extension", "format"],
        )
        .unwrap();
        let preview_errors_total = IntCounterVec::new(
            Opts::new("preview_errors_total", "Preview failures, by backend/extension/format"),
            &["backend", "extension", "format"],
        )
        .unwrap();
        let preview_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "preview_duration_seconds",
                "Time spent producing a preview, by backend/extension/format",
            ),
            &["backend", "extension", "format"],
        )
        .unwrap();
        let store_hits_total =
            IntCounter::new("store_hits_total", "Preview store cache hits").unwrap();
        let store_misses_total =
            IntCounter::new("store_misses_total", "Preview store cache misses").unwrap();
        let store_bytes = IntGauge::new("store_bytes", "Total bytes held in the preview store").unwrap();
        let store_entries = IntGauge::new("store_entries", "Total entries held in the preview store").unwrap();
        let transfers_in_progress = IntGaugeVec::new(
            Opts::new("transfers_in_progress", "In-flight request bodies, by kind"),
            &["kind"],
        )
        .unwrap();

        if enabled {
            for metric in [
                Box::new(previews_total.clone()) as Box<dyn prometheus::core::Collector>,
                Box::new(preview_errors_total.clone()),
                Box::new(preview_duration_seconds.clone()),
                Box::new(store_hits_total.clone()),
                Box::new(store_misses_total.clone()),
                Box::new(store_bytes.clone()),
                Box::new(store_entries.clone()),
                Box::new(transfers_in_progress.clone()),
            ] {
                let _ = registry.register(metric);
            }
        }

        Metrics {
            registry,
            enabled,
            previews_total,
            preview_errors_total,
            preview_duration_seconds,
            store_hits_total,
            store_misses_total,
            store_bytes,
            store_entries,
            transfers_in_progress,
        }
    }

    pub fn new_disabled() -> Self {
        Self::new(false)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_preview(&self, backend: &str, extension: &str, format: &str, elapsed: &std::time::Duration) {
        self.previews_total.with_label_values(&[backend, extension, format]).inc();
        self.duration_histogram(backend, extension, format).observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, backend: &str, extension: &str, format: &str) {
        self.preview_errors_total.with_label_values(&[backend, extension, format]).inc();
    }

    fn duration_histogram(&self, backend: &str, extension: &str, format: &str) -> Histogram {
        self.preview_duration_seconds.with_label_values(&[backend, extension, format])
    }

    pub fn record_store_hit(&self) {
        self.store_hits_total.inc();
    }

    pub fn record_store_miss(&self) {
        self.store_misses_total.inc();
    }

    pub fn set_store_gauges(&self, entries: u64, bytes: u64) {
        self.store_entries.set(entries as i64);
        self.store_bytes.set(bytes as i64);
    }

    pub fn transfer_started(&self, kind: &str) {
        self.transfers_in_progress.with_label_values(&[kind]).inc();
    }

    pub fn transfer_finished(&self, kind: &str) {
        self.transfers_in_progress.with_label_values(&[kind]).dec();
    }

    /// Renders the registry in Prometheus text exposition format.
    /// Returns `None` when metrics are disabled so the HTTP layer can
    /// 404 instead of serving an empty body.
    pub fn render(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf).ok()?;
        String::from_utf8(buf).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_render_none() {
        let m = Metrics::new_disabled();
        m.record_preview("image", "png", "image", &std::time::Duration::from_millis(5));
        assert!(m.render().is_none());
    }

    #[test]
    fn enabled_metrics_render_text() {
        let m = Metrics::new(true);
        m.record_preview("image", "png", "image", &std::time::Duration::from_millis(5));
        m.record_store_hit();
        let text = m.render().unwrap();
        assert!(text.contains("previews_total"));
        assert!(text.contains("store_hits_total"));
    }
}
