//! Starts every enabled service in this process and stops them together.

use crate::adapters::{
    HttpAnalysisBackend, LocalStorage, PopplerTools, RouterClient, TesseractEngine, WhatlangDetector,
};
use crate::app::services::frontend::{self, FrontendState};
use crate::app::services::lang_detect::{self, LangDetectState};
use crate::app::services::ocr::{self, OcrState};
use crate::app::services::preprocessor::{self, PreprocessorState};
use crate::app::services::router::{self, RouterState};
use crate::config::toml_config::{PhototypeConfig, ServiceEntry};
use crate::utils::error::{PhototypeError, Result};
use crate::utils::logger::display_name;
use crate::utils::monitor::ProcessMonitor;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

/// How long the frontend waits for a full router analysis.
const ROUTER_CLIENT_TIMEOUT: Duration = Duration::from_secs(300);
const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// 建立指定服務的 axum Router
pub fn build_service(name: &str, config: &PhototypeConfig, poppler: &PopplerTools) -> Result<Router> {
    let paths = &config.paths;
    let app = match name {
        "frontend" => frontend::create_router(FrontendState {
            uploads: LocalStorage::new(&paths.uploads_dir),
            json: LocalStorage::new(&paths.json_dir),
            extractor: Arc::new(poppler.clone()),
            router: config
                .frontend
                .router_url
                .as_ref()
                .map(|url| RouterClient::new(url.clone(), ROUTER_CLIENT_TIMEOUT)),
            max_upload_bytes: config.max_upload_bytes(),
        }),
        "router" => router::create_router(RouterState::new(
            HttpAnalysisBackend::from_config(&config.router),
            config.router.ocr_language.clone(),
        )),
        "lang-detect" => lang_detect::create_router(LangDetectState {
            detector: Arc::new(WhatlangDetector),
            extractor: Arc::new(poppler.clone()),
            defaults: config.lang_detect.clone(),
        }),
        "preprocessor" => preprocessor::create_router(PreprocessorState {
            rasterizer: Arc::new(poppler.clone()),
            poppler: poppler.clone(),
            output_dir: paths.processed_dir.clone(),
            dpi: config.preprocessor.dpi,
            enhance_dpi: config.preprocessor.enhance_dpi,
        }),
        other => {
            let ocr_config = config
                .ocr
                .iter()
                .find(|ocr| ocr.service_name() == other)
                .ok_or_else(|| PhototypeError::ConfigValidationError {
                    field: "service".to_string(),
                    message: format!("Unknown service '{}'", other),
                })?;
            ocr::create_router(OcrState {
                engine: Arc::new(TesseractEngine),
                service_name: ocr_config.service_name(),
                language: ocr_config.language.clone(),
                processed_dir: paths.processed_dir.clone(),
            })
        }
    };
    Ok(app)
}

fn prepare_directories(config: &PhototypeConfig) -> Result<()> {
    for dir in [
        &config.paths.uploads_dir,
        &config.paths.json_dir,
        &config.paths.processed_dir,
    ] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

async fn serve_service(
    entry: ServiceEntry,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = format!("{}:{}", entry.host, entry.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    tracing::info!("Stopped");
    Ok(())
}

fn service_span(name: &str) -> tracing::Span {
    tracing::info_span!("service", name = %display_name(name))
}

/// 啟動所有啟用的服務，直到 Ctrl+C 或任一服務失敗
pub async fn run_all(config: &PhototypeConfig, monitor: ProcessMonitor) -> Result<()> {
    prepare_directories(config)?;
    let poppler = PopplerTools::discover(config.paths.poppler_path.as_deref());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut services = JoinSet::new();

    for entry in config.services() {
        if !entry.enabled {
            tracing::info!("Skipping {} (disabled)", entry.name);
            continue;
        }
        tracing::info!("Starting {}...", entry.name);
        let app = build_service(&entry.name, config, &poppler)?;
        let span = service_span(&entry.name);
        let name = entry.name.clone();
        let task = serve_service(entry, app, shutdown_rx.clone()).instrument(span);
        services.spawn(async move { (name, task.await) });
    }
    tracing::info!("All enabled services started. Press Ctrl+C to stop.");

    let monitor = Arc::new(monitor);
    monitor.log_stats("Startup");
    let periodic = {
        let monitor = monitor.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { monitor.run_periodic(MONITOR_INTERVAL, shutdown).await })
    };

    let mut first_error = None;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("Unable to listen for Ctrl+C: {}", e);
            }
        }
        Some(joined) = services.join_next() => {
            first_error = record_exit(joined);
        }
    }

    tracing::info!("Stopping services...");
    let _ = shutdown_tx.send(true);
    while let Some(joined) = services.join_next().await {
        if let Some(e) = record_exit(joined) {
            first_error.get_or_insert(e);
        }
    }
    let _ = periodic.await;
    monitor.log_stats("Shutdown");
    tracing::info!("All services stopped.");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn record_exit(
    joined: std::result::Result<(String, Result<()>), tokio::task::JoinError>,
) -> Option<PhototypeError> {
    match joined {
        Ok((_, Ok(()))) => None,
        Ok((name, Err(e))) => {
            tracing::error!("{} exited with error: {}", name, e);
            Some(e)
        }
        Err(e) => {
            tracing::error!("Service task panicked: {}", e);
            Some(PhototypeError::ProcessingError {
                message: format!("Service task failed: {}", e),
            })
        }
    }
}

/// 只啟動單一服務 (不論設定中是否啟用)
pub async fn serve_one(config: &PhototypeConfig, name: &str) -> Result<()> {
    let entry = config
        .service(name)
        .ok_or_else(|| PhototypeError::ConfigValidationError {
            field: "service".to_string(),
            message: format!(
                "Unknown service '{}'. Known services: {}",
                name,
                config
                    .services()
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?;
    prepare_directories(config)?;
    let poppler = PopplerTools::discover(config.paths.poppler_path.as_deref());
    let app = build_service(name, config, &poppler)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let span = service_span(name);
    let mut server = tokio::spawn(serve_service(entry, app, shutdown_rx).instrument(span));

    // the server can exit on its own, e.g. when the port is already taken
    let exited = tokio::select! {
        joined = &mut server => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("Unable to listen for Ctrl+C: {}", e);
            }
            None
        }
    };
    let joined = match exited {
        Some(joined) => joined,
        None => {
            tracing::info!("Stopping {}...", name);
            let _ = shutdown_tx.send(true);
            server.await
        }
    };
    joined.map_err(|e| PhototypeError::ProcessingError {
        message: format!("Service task failed: {}", e),
    })?
}
