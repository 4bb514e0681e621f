//! Preview service entrypoint, grounded on `ferrex-server::main`'s
//! startup sequence: init tracing, load config, build shared state,
//! spawn background tasks, serve, shut down gracefully.

mod errors;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pvs_config::Config;
use pvs_core::backends::{BackendContext, ImageBackend, OfficeBackend, PdfBackend, VideoBackend};
use pvs_core::coordinator::Coordinator;
use pvs_core::icons::IconFallback;
use pvs_core::janitor::Janitor;
use pvs_core::metrics::Metrics;
use pvs_core::registry::BackendRegistry;
use pvs_core::source::FileSource;
use pvs_core::store::PreviewStore;
use pvs_core::worker_pool::WorkerPools;

use state::AppState;

/// Overrides for the handful of settings worth exposing on the command
/// line even though everything else comes from the environment (spec.md
/// §9 "Global state"): `host`/`port` are the two a deploy script is most
/// likely to want to pin without touching the env file.
#[derive(Parser, Debug)]
#[command(name = "pvs-server", about = "Preview/thumbnail generation service")]
struct Args {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

const DEFAULT_WORKER_POOL_SIZE: usize = 40;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let config = Arc::new(config);

    let metrics = Metrics::new(config.metrics_enabled);

    let mut registry = BackendRegistry::new();
    let image_backend = Arc::new(ImageBackend::new());
    let pdf_backend = Arc::new(PdfBackend::new());
    registry.register(image_backend.clone());
    registry.register(pdf_backend.clone());
    registry.register(Arc::new(OfficeBackend::new()));
    registry.register(Arc::new(VideoBackend::new()));

    let pools = WorkerPools::new(DEFAULT_WORKER_POOL_SIZE, config.max_office_workers);
    let backend_ctx = BackendContext {
        pools,
        metrics: metrics.clone(),
        pdf: pdf_backend,
        image: image_backend,
        soffice_addr: config.soffice_addr.clone(),
        soffice_port: config.soffice_port,
        soffice_timeout: config.soffice_timeout,
        soffice_retry: config.soffice_retry,
    };

    let store = PreviewStore::new(config.store_root.clone());
    let icons = IconFallback::load(config.icons_root.as_deref())
        .await?
        .with_redirect(config.icon_redirect.clone(), config.icon_resize);

    let coordinator = Arc::new(Coordinator::new(
        registry,
        store.clone(),
        icons,
        backend_ctx,
        config.store_root.is_some(),
        config.max_width,
        config.max_height,
    ));

    if let Some(store_root) = config.store_root.clone() {
        let janitor = Janitor::new(
            store,
            store_root,
            config.cleanup_interval,
            config.store_max_age,
            config.cleanup_max_size,
            metrics.clone(),
        );
        tokio::spawn(janitor.run());
    }

    let app_state = AppState {
        config: config.clone(),
        coordinator,
        http_client: FileSource::http_client()?,
        metrics,
    };

    let router = http::router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "preview service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
