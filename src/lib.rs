pub mod appresult;
pub mod broker;
pub mod chat;
pub mod config;
pub mod health;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower_http::cors::CorsLayer;

pub use appresult::{AppError, AppResult};
use chat::Hub;
use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: Hub,
    pub config: Arc<Config>,
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())

        .with_state(app_state)
        .layer(CorsLayer::very_permissive())
}
