use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectio::api::{create_router, AppState};
use lectio::config::Config;
use lectio::ocr::{OcrService, RecognitionRequest};

#[derive(Parser)]
#[command(name = "lectio")]
#[command(about = "Self-hostable single-page OCR over HTTP")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Recognize one image file and print the result as JSON
    Recognize {
        file: PathBuf,
        /// Language selector: auto, ch, en or ch_en
        #[arg(long, default_value = "auto")]
        lang: String,
        /// Include per-line boxes
        #[arg(long)]
        boxes: bool,
        /// Skip image cleanup
        #[arg(long)]
        no_preprocess: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lectio=info,tower_http=debug".into());
    let json = std::env::var("LECTIO_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    tracing::info!(engine = %config.engine.backend, "Initializing OCR service...");
    let ocr = OcrService::from_config(&config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, ocr).await,
        Command::Recognize {
            file,
            lang,
            boxes,
            no_preprocess,
        } => recognize(ocr, file, lang, boxes, no_preprocess).await,
    }
}

async fn recognize(
    ocr: OcrService,
    file: PathBuf,
    lang: String,
    boxes: bool,
    no_preprocess: bool,
) -> anyhow::Result<()> {
    let image = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut request = RecognitionRequest {
        image,
        language: lang,
        return_boxes: boxes,
        ..Default::default()
    };
    if no_preprocess {
        request.overrides.preprocess = Some(false);
    }

    let result = ocr.recognize(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn serve(config: Config, ocr: OcrService) -> anyhow::Result<()> {
    if config.server.admin_keys.is_empty() {
        tracing::warn!("LECTIO_ADMIN_KEYS is not set, /v1/engine/config is locked");
    }

    if config.engine.warmup {
        let language = ocr.pool().resolve_language(&config.engine.warmup_language);
        tracing::info!(language = %language, "Warming up OCR engine...");
        if let Err(e) = ocr.warmup(vec![language]).await {
            tracing::warn!(error = %e, "Warmup failed, engines will be built on first request");
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, ocr)?;
    let app = create_router(state);

    tracing::info!("Lectio starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/healthz", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
