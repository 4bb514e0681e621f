//! Integration test for the icon-fallback path through the full
//! coordinator, grounded on spec.md §4.6 ("errors degrade to an icon,
//! never surface to the caller").

use std::sync::Arc;

use pvs_core::backends::{BackendContext, ImageBackend, PdfBackend};
use pvs_core::coordinator::{Coordinator, PreviewOutcome};
use pvs_core::icons::IconFallback;
use pvs_core::metrics::Metrics;
use pvs_core::pathref::PathRef;
use pvs_core::registry::BackendRegistry;
use pvs_core::request::{OutputFormat, PageRange, PreviewRequest, StoreFlag};
use pvs_core::store::PreviewStore;
use pvs_core::worker_pool::WorkerPools;

fn test_context() -> BackendContext {
    BackendContext {
        pools: WorkerPools::new(4, 0),
        metrics: Metrics::new_disabled(),
        pdf: Arc::new(PdfBackend::new()),
        image: Arc::new(ImageBackend::new()),
        soffice_addr: "127.0.0.1".into(),
        soffice_port: 2002,
        soffice_timeout: std::time::Duration::from_secs(1),
        soffice_retry: 0,
    }
}

async fn write_icon(root: &std::path::Path, dim: u32, stem: &str) {
    let dir = root.join(dim.to_string());
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join(format!("{stem}.png")), b"icon-bytes").await.unwrap();
}

#[tokio::test]
async fn unsupported_extension_falls_back_to_icon() {
    let icon_root = tempfile::tempdir().unwrap();
    write_icon(icon_root.path(), 64, "default").await;
    let icons = IconFallback::load(Some(icon_root.path())).await.unwrap();

    // No backends registered at all: every extension is unsupported.
    let registry = BackendRegistry::new();
    let coordinator = Coordinator::new(registry, PreviewStore::new(None), icons, test_context(), false, 800, 600);

    let src_dir = tempfile::tempdir().unwrap();
    let src_path = src_dir.path().join("weird.xyz");
    tokio::fs::write(&src_path, b"data").await.unwrap();
    let src = PathRef::new_temp(src_path).await.unwrap();

    let req = PreviewRequest::new(
        "weird.xyz".into(),
        OutputFormat::Image,
        100,
        100,
        PageRange::SINGLE_FIRST,
        StoreFlag::Unset,
        None,
        src,
    );

    let outcome = coordinator.handle(req, None).await.unwrap();
    match outcome {
        PreviewOutcome::Icon(path) => assert_eq!(path.file_name().unwrap(), "default.png"),
        _ => panic!("expected an icon fallback"),
    }
}
