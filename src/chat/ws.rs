use axum::{debug_handler, extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}}, response::IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broker::{ClientEvent, ConnectionId, ServerEvent};

use super::hub::Hub;

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(hub): State<Hub>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| serve(stream, hub).await)
}

async fn serve(stream: WebSocket, hub: Hub) {
    let id = ConnectionId::new();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut sender, mut receiver) = stream.split();
    info!(connection = %id, "connected");

    hub.connect(id, events_tx);

    let forward_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    error!(connection = %id, %err, "could not encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => {
                    debug!(connection = %id, event = event.name(), "received");
                    hub.inbound(id, event);
                }
                Err(err) => warn!(connection = %id, %err, "malformed event dropped"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.disconnect(id);
    info!(connection = %id, "disconnected");

    forward_task.abort();
}
