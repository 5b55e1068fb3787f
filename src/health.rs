use std::sync::Arc;

use axum::{debug_handler, extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::{config::Config, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub status: String,
    pub port: u16,
    pub timestamp: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

fn status(status: &str, config: &Config) -> AppResult<Json<Status>> {
    Ok(Json(Status {
        status: status.to_owned(),
        port: config.port,
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
    }))
}

#[debug_handler(state = AppState)]
pub async fn index(State(config): State<Arc<Config>>) -> AppResult<Json<Status>> {
    debug!("health check requested");
    status("Server is running", &config)
}

#[debug_handler(state = AppState)]
pub async fn health(State(config): State<Arc<Config>>) -> AppResult<Json<Status>> {
    debug!("health check requested at /health");
    status("OK", &config)
}
