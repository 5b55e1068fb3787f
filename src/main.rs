use std::sync::Arc;

use anyhow::Context;
use strangers::{app, broker::Broker, chat::Hub, config::Config, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let hub = Hub::spawn(Broker::new(config.message_history_limit));
    let app_state = AppState {
        hub,
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("could not bind {}", config.addr()))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.addr(),
        history_limit = config.message_history_limit,
        "server running"
    );

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
