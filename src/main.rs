#[cfg(not(unix))]
use std::future;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use dora_backend::{
    config::{load_config, Config},
    router,
    store::{MemoryStore, PgStore, ReleaseStore},
    AppContext,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| o.parse::<HeaderValue>().with_context(|| format!("invalid cors origin {o}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn start_api(config: Config, store: Arc<dyn ReleaseStore>) -> anyhow::Result<()> {
    let ctx = AppContext::new(store, config.metrics.clone());

    let app = router(ctx)
        .layer(TimeoutLayer::new(config.api.request_timeout))
        .layer(cors_layer(&config.api.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.api.bind).await?;
    tracing::info!(bind = %config.api.bind, "api is running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dora_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config().await?;

    let store: Arc<dyn ReleaseStore> = match &config.database {
        Some(database) => Arc::new(PgStore::connect(database).await?),
        None => {
            tracing::warn!("no [database] configured, records are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    start_api(config, store).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
