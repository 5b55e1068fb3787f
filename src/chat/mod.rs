pub mod hub;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use hub::Hub;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
}
