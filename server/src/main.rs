// College attendance server
// Entry point and application setup

use anyhow::Context;
use college_attendance::{api, app, config::ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "college_attendance=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting college attendance server");

    let config = ServerConfig::from_env();
    let addr = config.bind_addr;

    let state = app::setup(config)
        .await
        .context("Failed to initialize application")?;
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .await
        .context("Server error")?;

    Ok(())
}
