use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use htmx_feeds::config::Config;
use htmx_feeds::fetcher::{start_background_refresh, Fetcher};
use htmx_feeds::registry::FeedRegistry;
use htmx_feeds::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "htmx_feeds=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("FEEDS_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded {} feeds from {}", config.feeds.len(), config_path);

    let registry = FeedRegistry::from_config(&config.feeds).into_shared();
    let fetcher = Arc::new(Fetcher::new(registry.clone())?);

    if let Some(minutes) = config.refresh_interval.filter(|m| *m > 0) {
        info!("Background refresh every {} minutes", minutes);
        let bg_fetcher = fetcher.clone();
        tokio::spawn(async move {
            start_background_refresh(bg_fetcher, minutes).await;
        });
    }

    let state = Arc::new(AppState {
        registry,
        fetcher,
        page_size: config.page_size,
    });
    let app = routes::app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
