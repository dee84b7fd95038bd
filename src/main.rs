use spindle::spindle_log::SpindleLogger;
use spindle::*;

use axum::{routing::get, Router};
use clap::Parser;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => "spindle=debug,tower_http=warn".into(),
    };

    // File logging alongside the console: daily-rolling, non-blocking.
    let file_appender = tracing_appender::rolling::daily(".", "spindle.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();

    spindle::logging::setup_panic_hook();

    let args = Arc::new(Args::parse());

    if !args.disable_raw_dump {
        if let Err(e) = tokio::fs::create_dir_all(&args.dump_dir).await {
            tracing::error!("Failed to create dump dir {}: {}", args.dump_dir, e);
            std::process::exit(1);
        }
    }

    let logger = match SpindleLogger::open(&args.spindle_log, !args.disable_preview).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to open spindle log {}: {}", args.spindle_log, e);
            std::process::exit(1);
        }
    };

    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(args.request_timeout_secs))
        .connect_timeout(std::time::Duration::from_secs(args.connect_timeout_secs))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(std::time::Duration::from_secs(60)))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        client,
        upstream: args.upstream.trim_end_matches('/').to_string(),
        logger: logger.clone(),
        args: args.clone(),
    });

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/readyz", get(health::readiness))
        .fallback(spindle::proxy::forward)
        .layer(axum::extract::DefaultBodyLimit::max(args.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let server_handle = tokio::spawn(async move {
        tracing::info!(
            "Spindle listening on {} -> {}",
            addr,
            state.upstream
        );
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Termination signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    // In-flight connections are not drained; the log writer is. Spindles
    // already queued land on disk before exit.
    logger.shutdown().await;
    server_handle.abort();
}
