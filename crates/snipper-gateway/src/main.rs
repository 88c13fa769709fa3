use clap::Parser;
use snipper_core::Shortener;
use snipper_gateway::auth::DEFAULT_TOKEN_TTL;
use snipper_gateway::cli::CLI;
use snipper_gateway::{App, AppState, TokenIssuer};
use snipper_shortener::ShortenerService;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    snipper_telemetry::init(&config.telemetry_config())?;

    let storage_settings = config.storage_settings()?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %storage_settings.backend,
        "starting snipper"
    );
    if config.uses_default_secret() {
        warn!("using the default secret key, set SNIPPER_SECRET_KEY in production");
    }

    let storage = snipper_storage::open(&storage_settings).await?;
    let shortener: Arc<dyn Shortener> = Arc::new(ShortenerService::new(
        Arc::clone(&storage),
        config.shortener_config(),
    ));
    let state = AppState::new(
        Arc::clone(&shortener),
        TokenIssuer::new(&config.secret_key, DEFAULT_TOKEN_TTL),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http server stopped, draining deletions");
    shortener.shutdown().await?;
    storage.shutdown().await?;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to listen for SIGTERM");
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

    info!("shutdown signal received");
}
