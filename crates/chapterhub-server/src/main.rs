mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use chapterhub_api::{AppState, AppStateInner};
use chapterhub_audit::Auditor;
use chapterhub_baas::Baas;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chapterhub=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    if config.baas.service_role_key.is_none() {
        warn!("SUPABASE_SERVICE_ROLE_KEY is not set; admin reads fall back to the caller's session");
    }
    if config.api.maps_api_key.is_none() {
        warn!("GOOGLE_MAPS_API_KEY is not set; /api/places will answer 500");
    }

    let baas = Baas::new(config.baas.clone())?;
    let auditor = Auditor::new(config.audit.clone())?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("chapterhub/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let state: AppState = Arc::new(AppStateInner {
        baas,
        auditor,
        http,
        config: config.api.clone(),
    });

    let app = chapterhub_api::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("ChapterHub listening on {}", addr);
    info!(
        "Audit models: {} / {}",
        config.audit.analyze_model, config.audit.merge_model
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
