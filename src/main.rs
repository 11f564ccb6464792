//! OCR Gateway
//!
//! Serves text extraction over HTTP, backed by PaddleOCR or an Ollama
//! vision model.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_gateway::config::{BackendKind, Config};
use ocr_gateway::ocr::{ExtractionBackend, OllamaBackend};
use ocr_gateway::routes;
use ocr_gateway::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_gateway=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing::info!("Starting OCR Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Backend: {}", config.backend.kind);

    let backend = build_backend(&config)?;
    tracing::info!("Model: {}", backend.model_name());

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;

    let app = routes::app(AppState::new(config, backend));

    tracing::info!("OCR Gateway listening on {}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health     - health check");
    tracing::info!("  POST /ocr        - extract text from one image");
    tracing::info!("  POST /ocr/batch  - extract text from several images");
    tracing::info!("  GET  /models     - list available models");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn ExtractionBackend>> {
    match config.backend.kind {
        BackendKind::Ollama => {
            let ollama = &config.backend.ollama;
            tracing::info!("Ollama endpoint: {}", ollama.url);
            Ok(Arc::new(OllamaBackend::new(ollama, config.temp_dir())?))
        }
        #[cfg(feature = "paddle")]
        BackendKind::Paddle => {
            use ocr_gateway::ocr::{LineRecognitionBackend, PaddleOcrEngine};

            let engine = PaddleOcrEngine::load(&config.backend.paddle)?;
            Ok(Arc::new(LineRecognitionBackend::new(engine)))
        }
        #[cfg(not(feature = "paddle"))]
        BackendKind::Paddle => {
            anyhow::bail!("PaddleOCR support is not compiled in; rebuild with --features paddle")
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
