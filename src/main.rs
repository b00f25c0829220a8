use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use class_tracker_api::{config::Config, routes, services::metrics, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let store = store::create_store(&config).await?;
    store.ping().await?;
    info!("Data store connected");

    metrics::register_all();

    let state = AppState::new(store, config.clone());
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Class tracker API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
